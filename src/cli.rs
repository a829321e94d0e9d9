//! CLI command definitions for config-stacker
//!
//! This module defines the CLI structure using clap's derive macros and the
//! command runner used by the binary.

use crate::loader::TierLoader;
use crate::node::MappingNode;
use crate::source::Source;
use crate::sources::{EnvAdapter, JsonFile, YamlFile};
use crate::stacker::StackedConfig;
use crate::value::Node;
use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

/// Output format for `dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Inspect and edit layered configuration
///
/// Sources are stacked lowest to highest priority in this order: the tiers of
/// `--app`, then `--yaml` files, then `--json` files, then `--env-prefix`
/// variables. Within one option, later occurrences have higher priority.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Load the defaults, project, user and environment tiers of this application
    #[arg(long, global = true)]
    pub app: Option<String>,

    /// YAML file source (repeatable)
    #[arg(long = "yaml", value_name = "PATH", global = true)]
    pub yaml: Vec<PathBuf>,

    /// JSON file source (repeatable)
    #[arg(long = "json", value_name = "PATH", global = true)]
    pub json: Vec<PathBuf>,

    /// Environment variable source for variables starting with PREFIX (repeatable)
    #[arg(long, value_name = "PREFIX", global = true)]
    pub env_prefix: Vec<String>,

    /// Give the first source the highest priority instead of the last
    #[arg(long, global = true)]
    pub reverse: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved value of a key
    Get {
        /// Dotted or bracketed key, e.g. `server.port` or `hosts[example.com]`
        key: String,
    },

    /// Print the whole resolved configuration
    Dump {
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// List the keys of the root or of a section
    Keys {
        /// Section to list (root if omitted)
        path: Option<String>,
    },

    /// Assign a value; parsed as JSON when possible, otherwise stored as a string
    Set { key: String, value: String },
}

impl Cli {
    /// Stack the sources named on the command line.
    pub fn build_config(&self) -> Result<StackedConfig> {
        let mut sources: Vec<Source> = Vec::new();
        if let Some(app) = &self.app {
            sources.extend(TierLoader::new(app).tiers().into_iter().map(|(_, s)| s));
        }
        sources.extend(self.yaml.iter().map(|p| Source::new(YamlFile::new(p))));
        sources.extend(self.json.iter().map(|p| Source::new(JsonFile::new(p))));
        sources.extend(
            self.env_prefix
                .iter()
                .map(|prefix| Source::new(EnvAdapter::new(prefix))),
        );

        if sources.is_empty() {
            bail!("No sources given; use --app, --yaml, --json or --env-prefix");
        }

        let config = sources
            .into_iter()
            .fold(StackedConfig::builder().reverse(self.reverse), |b, s| b.source(s))
            .build();
        Ok(config)
    }
}

/// Run `cli.command` against `config`, printing results to `out`.
pub fn run(cli: &Cli, config: &StackedConfig, out: &mut impl Write) -> Result<()> {
    match &cli.command {
        Command::Get { key } => match config.get_path(key.as_str())? {
            Node::Value(Value::String(s)) => writeln!(out, "{s}")?,
            Node::Value(value) => writeln!(out, "{value}")?,
            Node::Section(section) => {
                writeln!(out, "{}", serde_json::to_string_pretty(&section.dump()?)?)?
            }
            Node::Object(_) => writeln!(out, "<object>")?,
        },
        Command::Dump { format } => {
            let data = config.dump()?;
            match format {
                OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&data)?)?,
                OutputFormat::Yaml => write!(out, "{}", serde_yaml::to_string(&data)?)?,
            }
        }
        Command::Keys { path } => {
            let keys = match path {
                None => config.keys()?,
                Some(path) => match config.get_path(path.as_str())? {
                    Node::Section(section) => section.keys()?,
                    _ => bail!("'{path}' is not a section"),
                },
            };
            for key in keys {
                writeln!(out, "{key}")?;
            }
        }
        Command::Set { key, value } => {
            let parsed = serde_json::from_str::<Value>(value)
                .unwrap_or_else(|_| Value::String(value.clone()));
            config.set_path(key.as_str(), parsed)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run_args(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(args)?;
        let config = cli.build_config()?;
        let mut out = Vec::new();
        run(&cli, &config, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    /// Run a command against a YAML file stacked under a JSON file.
    fn run_stacked(low: &str, high: &str, command: &[&str]) -> Result<String> {
        let mut args = vec!["config-stacker", "--yaml", low, "--json", high];
        args.extend_from_slice(command);
        run_args(&args)
    }

    fn fixture(dir: &TempDir) -> (String, String) {
        let low = dir.path().join("low.yaml");
        let high = dir.path().join("high.json");
        fs::write(&low, "server:\n  port: 8080\n  host: localhost\nname: low\n").unwrap();
        fs::write(&high, r#"{"server": {"port": 9000}}"#).unwrap();
        (
            low.to_string_lossy().into_owned(),
            high.to_string_lossy().into_owned(),
        )
    }

    #[test]
    fn test_get_resolves_across_files() {
        let dir = TempDir::new().unwrap();
        let (low, high) = fixture(&dir);

        let out = run_stacked(&low, &high, &["get", "server.port"]).unwrap();
        assert_eq!(out, "9000\n");

        let out = run_stacked(&low, &high, &["get", "name"]).unwrap();
        assert_eq!(out, "low\n");
    }

    #[test]
    fn test_reverse_flips_priority() {
        let dir = TempDir::new().unwrap();
        let (low, high) = fixture(&dir);

        let out = run_stacked(&low, &high, &["--reverse", "get", "server.port"]).unwrap();
        assert_eq!(out, "8080\n");
    }

    #[test]
    fn test_keys_and_dump() {
        let dir = TempDir::new().unwrap();
        let (low, high) = fixture(&dir);

        let out = run_stacked(&low, &high, &["keys", "server"]).unwrap();
        assert_eq!(out, "host\nport\n");

        let out = run_stacked(&low, &high, &["dump"]).unwrap();
        let dumped: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            dumped,
            serde_json::json!({"name": "low", "server": {"host": "localhost", "port": 9000}})
        );
    }

    #[test]
    fn test_set_writes_existing_key_to_its_file() {
        let dir = TempDir::new().unwrap();
        let (low, high) = fixture(&dir);

        run_stacked(&low, &high, &["set", "name", "\"renamed\""]).unwrap();
        let content = fs::read_to_string(&low).unwrap();
        assert!(content.contains("name: renamed"));
    }

    #[test]
    fn test_no_sources_is_an_error() {
        assert!(run_args(&["config-stacker", "dump"]).is_err());
    }
}
