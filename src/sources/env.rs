//! Environment variable adapter.

use crate::source::Adapter;
use crate::value::{Mapping, set_in};
use serde_json::Value;
use tracing::warn;

/// Untyped, read-only adapter over environment variables.
///
/// Variables starting with `prefix` become keys: the remainder is lowercased
/// and split on the subsection token, so with prefix `MYAPP` the variable
/// `MYAPP_SERVER_PORT=8080` reads as `server.port = "8080"`. All values are
/// strings; a stacked config coerces them using a typed source.
#[derive(Debug, Clone)]
pub struct EnvAdapter {
    name: String,
    prefix: String,
    token: String,
    vars: Option<Vec<(String, String)>>,
}

impl EnvAdapter {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            name: format!("env:{prefix}"),
            prefix,
            token: "_".to_string(),
            vars: None,
        }
    }

    /// Token separating subsections in variable names.
    pub fn subsection_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Read from a fixed variable set instead of the process environment.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    fn key_path(&self, var: &str) -> Option<Vec<String>> {
        let rest = var.strip_prefix(&self.prefix)?;
        let rest = if self.prefix.ends_with(&self.token) {
            rest
        } else {
            rest.strip_prefix(&self.token)?
        };
        let segments: Vec<String> = rest
            .split(self.token.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
        (!segments.is_empty()).then_some(segments)
    }
}

impl Adapter for EnvAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_typed(&self) -> bool {
        false
    }

    fn read_all(&self) -> anyhow::Result<Mapping> {
        let vars: Vec<(String, String)> = match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        };

        let mut data = Mapping::new();
        for (var, value) in vars {
            let Some(path) = self.key_path(&var) else {
                continue;
            };
            if set_in(&mut data, &path, Value::String(value)).is_err() {
                warn!(
                    variable = %var,
                    "Variable conflicts with another variable's section, skipping"
                );
            }
        }
        Ok(data)
    }
}
