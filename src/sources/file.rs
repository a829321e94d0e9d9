//! File-backed adapters.

use crate::source::Adapter;
use crate::value::Mapping;
use anyhow::{Context, bail};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn parse(self, content: &str) -> anyhow::Result<Value> {
        Ok(match self {
            Format::Yaml => serde_yaml::from_str(content)?,
            Format::Json => serde_json::from_str(content)?,
        })
    }

    fn render(self, data: &Mapping) -> anyhow::Result<String> {
        Ok(match self {
            Format::Yaml => serde_yaml::to_string(data)?,
            Format::Json => {
                let mut out = serde_json::to_string_pretty(data)?;
                out.push('\n');
                out
            }
        })
    }
}

#[derive(Debug, Clone)]
struct FileBackend {
    name: String,
    path: PathBuf,
    format: Format,
    optional: bool,
}

impl FileBackend {
    fn new(path: PathBuf, format: Format) -> Self {
        Self {
            name: path.display().to_string(),
            path,
            format,
            optional: false,
        }
    }

    fn read(&self) -> anyhow::Result<Mapping> {
        if self.optional && !self.path.exists() {
            return Ok(Mapping::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }

        let value = self
            .format
            .parse(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        match value {
            Value::Object(mapping) => Ok(mapping),
            Value::Null => Ok(Mapping::new()),
            _ => bail!("{} does not contain a mapping at its root", self.path.display()),
        }
    }

    fn write(&self, data: &Mapping) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = self.format.render(data)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

macro_rules! file_adapter {
    ($(#[$doc:meta])* $name:ident, $format:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(FileBackend);

        impl $name {
            pub fn new(path: impl Into<PathBuf>) -> Self {
                Self(FileBackend::new(path.into(), $format))
            }

            /// Treat a missing file as an empty mapping.
            pub fn optional(mut self) -> Self {
                self.0.optional = true;
                self
            }

            pub fn path(&self) -> &Path {
                &self.0.path
            }
        }

        impl Adapter for $name {
            fn name(&self) -> &str {
                &self.0.name
            }

            fn read_all(&self) -> anyhow::Result<Mapping> {
                self.0.read()
            }

            fn supports_write(&self) -> bool {
                true
            }

            fn write_all(&self, data: &Mapping) -> anyhow::Result<()> {
                self.0.write(data)
            }

            fn watch_path(&self) -> Option<&Path> {
                Some(&self.0.path)
            }
        }
    };
}

file_adapter!(
    /// Typed, writable adapter over a YAML file.
    YamlFile,
    Format::Yaml
);

file_adapter!(
    /// Typed, writable adapter over a JSON file.
    JsonFile,
    Format::Json
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_read_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "a: 1\nb:\n  c: two\n").unwrap();

        let adapter = YamlFile::new(&path);
        let data = adapter.read_all().unwrap();
        assert_eq!(Value::Object(data.clone()), json!({"a": 1, "b": {"c": "two"}}));

        let mut data = data;
        data.insert("d".to_string(), json!([1, 2]));
        adapter.write_all(&data).unwrap();

        let reread = YamlFile::new(&path).read_all().unwrap();
        assert_eq!(reread["d"], json!([1, 2]));
    }

    #[test]
    fn test_json_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let adapter = JsonFile::new(&path);
        adapter
            .write_all(json!({"x": true}).as_object().unwrap())
            .unwrap();
        assert_eq!(adapter.read_all().unwrap()["x"], json!(true));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");

        assert!(YamlFile::new(&path).read_all().is_err());
        assert!(YamlFile::new(&path).optional().read_all().unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_empty_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.yaml");
        fs::write(&path, "\n").unwrap();
        assert!(YamlFile::new(&path).read_all().unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_root_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(JsonFile::new(&path).read_all().is_err());
    }
}
