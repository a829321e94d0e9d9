//! The uniform nested-mapping interface.

use crate::error::{Result, StackError};
use crate::keys::KeyPath;
use crate::value::{ConvertedValue, Mapping, Node};
use serde_json::Value;

/// Read/write view over a nested mapping.
///
/// Implemented by [`SourceSection`](crate::source::SourceSection) for a
/// single source and by [`StackedConfig`](crate::stacker::StackedConfig) for
/// a whole source list. Keys given to [`get`](Self::get) and
/// [`set`](Self::set) are literal; use the `_path` variants for dotted or
/// bracketed paths.
pub trait MappingNode: Sized {
    /// Value at `key` relative to this view.
    fn get(&self, key: &str) -> Result<Node<Self>>;

    /// Assign `value` at the dotted or bracketed `path`.
    fn set_path(&self, path: impl Into<KeyPath>, value: impl Into<ConvertedValue>) -> Result<()>;

    /// Top-level keys of this view, sorted and de-duplicated.
    fn keys(&self) -> Result<Vec<String>>;

    /// Plain nested mapping of everything below this view.
    fn dump(&self) -> Result<Mapping>;

    /// Descend through sub-sections along `path`.
    fn get_path(&self, path: impl Into<KeyPath>) -> Result<Node<Self>> {
        let path = path.into();
        let Some((last, parents)) = path.segments().split_last() else {
            return Err(StackError::key_not_found(""));
        };

        let mut walked = KeyPath::root();
        let mut owned: Option<Self> = None;
        for key in parents {
            walked = walked.child(key);
            let view = owned.as_ref().unwrap_or(self);
            match view.get(key)? {
                Node::Section(section) => owned = Some(section),
                _ => return Err(StackError::not_a_section(walked.dotted())),
            }
        }

        owned.as_ref().unwrap_or(self).get(last)
    }

    /// Assign `value` to the literal `key`.
    fn set(&self, key: &str, value: impl Into<ConvertedValue>) -> Result<()> {
        self.set_path(KeyPath::single(key), value)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Value at `key`, or `default` when no value exists.
    fn get_or(&self, key: &str, default: Value) -> Result<Node<Self>> {
        match self.get(key) {
            Err(e) if e.is_not_found() => Ok(Node::Value(default)),
            other => other,
        }
    }

    /// Value at `key`; when missing, assign `value` first.
    fn setdefault(&self, key: &str, value: impl Into<ConvertedValue>) -> Result<Node<Self>> {
        match self.get(key) {
            Err(e) if e.is_not_found() => {
                self.set(key, value)?;
                self.get(key)
            }
            other => other,
        }
    }

    /// Assign every top-level entry of `data`.
    fn update(&self, data: &Mapping) -> Result<()> {
        for (key, value) in data {
            self.set(key, value.clone())?;
        }
        Ok(())
    }

    fn items(&self) -> Result<Vec<(String, Node<Self>)>> {
        self.keys()?
            .into_iter()
            .map(|key| {
                let node = self.get(&key)?;
                Ok((key, node))
            })
            .collect()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.keys()?.is_empty())
    }
}
