//! In-memory mapping adapter.

use crate::source::Adapter;
use crate::value::Mapping;
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Typed, writable adapter over a shared in-process mapping.
///
/// Clones share the same mapping, so a test can keep a handle and change
/// the data behind a source.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    name: String,
    data: Arc<RwLock<Mapping>>,
}

impl MemoryAdapter {
    /// Adapter over `data`; anything other than an object starts empty.
    pub fn new(data: Value) -> Self {
        let mapping = match data {
            Value::Object(mapping) => mapping,
            _ => Mapping::new(),
        };
        Self::from_mapping(mapping)
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self {
            name: "memory".to_string(),
            data: Arc::new(RwLock::new(mapping)),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Swap the whole mapping, bypassing any source cache.
    pub fn replace(&self, mapping: Mapping) {
        let mut guard = self.data.write().unwrap_or_else(|e| e.into_inner());
        *guard = mapping;
    }
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_all(&self) -> anyhow::Result<Mapping> {
        let guard = self
            .data
            .read()
            .map_err(|_| anyhow::anyhow!("memory source lock poisoned"))?;
        Ok(guard.clone())
    }

    fn supports_write(&self) -> bool {
        true
    }

    fn write_all(&self, data: &Mapping) -> anyhow::Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow::anyhow!("memory source lock poisoned"))?;
        *guard = data.clone();
        Ok(())
    }
}
