//! Tiered configuration loading.
//!
//! Builds a [`StackedConfig`] from the usual layers of an application's
//! configuration, lowest to highest priority:
//!
//! 1. embedded defaults
//! 2. project config (`./<app>/config.yaml`)
//! 3. user config (`~/.<app>/config.yaml`)
//! 4. environment variables (`<APP>_…`)

use crate::converters::ConverterRegistry;
use crate::source::Source;
use crate::sources::{EnvAdapter, MemoryAdapter, YamlFile};
use crate::stacker::StackedConfig;
use crate::strategies::StrategyMap;
use crate::value::Mapping;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name looked up in every config directory.
pub const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config
    Project = 1,
    /// User-level config
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Environment variable prefix for an application name (`my-app` -> `MY_APP`).
pub fn env_prefix(app: &str) -> String {
    app.to_uppercase().replace(['-', '.', ' '], "_")
}

/// Directories of the file-backed tiers.
#[derive(Debug, Clone)]
pub struct TierPaths {
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
}

impl TierPaths {
    /// Discover directories from the environment and defaults.
    ///
    /// `<APP>_USER_DIR` overrides `~/.<app>` and `<APP>_PROJECT_DIR`
    /// overrides `./<app>`.
    pub fn discover(app: &str) -> Self {
        let prefix = env_prefix(app);

        let user_dir = std::env::var(format!("{prefix}_USER_DIR"))
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(format!(".{app}"))));

        let project_dir = std::env::var(format!("{prefix}_PROJECT_DIR"))
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from(app)));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn config_file(&self, tier: ConfigTier) -> Option<PathBuf> {
        let dir = match tier {
            ConfigTier::Project => self.project_dir.as_deref(),
            ConfigTier::User => self.user_dir.as_deref(),
            ConfigTier::Defaults | ConfigTier::Environment => None,
        };
        dir.map(|d| d.join(CONFIG_FILE))
    }
}

/// Builder for a tiered [`StackedConfig`].
#[derive(Debug, Clone)]
pub struct TierLoader {
    app: String,
    paths: TierPaths,
    defaults: Mapping,
    env_vars: Option<Vec<(String, String)>>,
    cached: bool,
    strategies: StrategyMap,
    converters: ConverterRegistry,
}

impl TierLoader {
    /// Loader for `app` with discovered paths.
    pub fn new(app: impl Into<String>) -> Self {
        let app = app.into();
        let paths = TierPaths::discover(&app);
        Self::with_paths(app, paths)
    }

    pub fn with_paths(app: impl Into<String>, paths: TierPaths) -> Self {
        Self {
            app: app.into(),
            paths,
            defaults: Mapping::new(),
            env_vars: None,
            cached: false,
            strategies: StrategyMap::new(),
            converters: ConverterRegistry::new(),
        }
    }

    pub fn paths(&self) -> &TierPaths {
        &self.paths
    }

    /// Embedded defaults, the lowest tier. They are never written to.
    pub fn defaults(mut self, defaults: Mapping) -> Self {
        self.defaults = defaults;
        self
    }

    /// Read the environment tier from a fixed variable set.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Cache the file tiers.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn strategies(mut self, strategies: StrategyMap) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// Sources of every tier, lowest priority first.
    pub fn tiers(&self) -> Vec<(ConfigTier, Source)> {
        let mut tiers = vec![(
            ConfigTier::Defaults,
            Source::builder(MemoryAdapter::from_mapping(self.defaults.clone()).named("defaults"))
                .readonly(true)
                .build(),
        )];

        for tier in [ConfigTier::Project, ConfigTier::User] {
            if let Some(file) = self.paths.config_file(tier) {
                debug!(%tier, path = %file.display(), "Adding config file tier");
                tiers.push((tier, self.file_source(&file)));
            }
        }

        let mut env = EnvAdapter::new(env_prefix(&self.app));
        if let Some(vars) = &self.env_vars {
            env = env.with_vars(vars.clone());
        }
        tiers.push((ConfigTier::Environment, Source::new(env)));

        tiers
    }

    fn file_source(&self, file: &Path) -> Source {
        Source::builder(YamlFile::new(file).optional())
            .cached(self.cached)
            .build()
    }

    /// Stack every tier.
    pub fn build(&self) -> StackedConfig {
        let config = StackedConfig::builder()
            .strategies(self.strategies.clone())
            .converters(self.converters.clone());
        let config = self
            .tiers()
            .into_iter()
            .fold(config, |config, (_, source)| config.source(source))
            .build();
        info!(app = %self.app, sources = config.source_list().len(), "Loaded tiered config");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MappingNode;
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    fn defaults() -> Mapping {
        json!({"server": {"port": 8080, "host": "localhost"}, "debug": false})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_tier_ordering() {
        assert!(ConfigTier::Defaults < ConfigTier::Project);
        assert!(ConfigTier::Project < ConfigTier::User);
        assert!(ConfigTier::User < ConfigTier::Environment);
        assert_eq!(ConfigTier::User.to_string(), "user");
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("my-app"), "MY_APP");
        assert_eq!(env_prefix("tool"), "TOOL");
    }

    #[test]
    fn test_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = TierPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );
        let config = TierLoader::with_paths("app", paths)
            .defaults(defaults())
            .env_vars(Vec::<(String, String)>::new())
            .build();

        assert_eq!(
            config.get_path("server.port").unwrap().into_value(),
            Some(json!(8080))
        );
    }

    #[test]
    fn test_tiers_override_lowest_to_highest() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let user = temp.path().join("user");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&user).unwrap();
        fs::write(project.join(CONFIG_FILE), "server:\n  port: 9000\n  host: project\n").unwrap();
        fs::write(user.join(CONFIG_FILE), "server:\n  host: user\n").unwrap();

        let config = TierLoader::with_paths("app", TierPaths::with_dirs(Some(project), Some(user)))
            .defaults(defaults())
            .env_vars([("APP_DEBUG", "yes")])
            .build();

        assert_eq!(
            config.get_path("server.port").unwrap().into_value(),
            Some(json!(9000))
        );
        assert_eq!(
            config.get_path("server.host").unwrap().into_value(),
            Some(json!("user"))
        );
        // Coerced with the defaults as type reference.
        assert_eq!(config.get("debug").unwrap().into_value(), Some(json!(true)));
    }

    #[test]
    fn test_new_keys_written_to_user_file() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("user");
        let config = TierLoader::with_paths(
            "app",
            TierPaths::with_dirs(Some(temp.path().join("project")), Some(user.clone())),
        )
        .defaults(defaults())
        .env_vars(Vec::<(String, String)>::new())
        .build();

        config.set("theme", "dark").unwrap();

        let written: Value =
            serde_yaml::from_str(&fs::read_to_string(user.join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(written, json!({"theme": "dark"}));
    }
}
