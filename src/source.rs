//! A single configuration source.
//!
//! A [`Source`] wraps an [`Adapter`] (the backend that produces and persists
//! a nested mapping) with a lock flag, a per-source converter registry and
//! an optional snapshot cache. `Source` is a cheap clonable handle: clones
//! share the adapter and the cache, and two handles are the same source when
//! [`Source::ptr_eq`] says so.

use crate::converters::ConverterRegistry;
use crate::error::{Result, StackError};
use crate::keys::KeyPath;
use crate::node::MappingNode;
use crate::value::{
    ConvertedValue, Mapping, Node, PathLookup, get_in, remove_in, section_in, set_in,
};
use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Backend that loads and stores a whole nested mapping.
pub trait Adapter: Send + Sync {
    /// Human readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether stored scalars keep their types.
    ///
    /// Untyped backends (environment variables, INI-like files) store
    /// everything as strings; reads through a stack coerce them using a
    /// typed source as the reference.
    fn is_typed(&self) -> bool {
        true
    }

    fn read_all(&self) -> anyhow::Result<Mapping>;

    fn supports_write(&self) -> bool {
        false
    }

    fn write_all(&self, _data: &Mapping) -> anyhow::Result<()> {
        anyhow::bail!("{} does not support writing", self.name())
    }

    /// File backing this adapter, if any.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

struct SourceInner {
    adapter: Box<dyn Adapter>,
    locked: bool,
    converters: ConverterRegistry,
    cache_enabled: AtomicBool,
    cache: ArcSwapOption<Mapping>,
}

/// Shared handle to one configuration source.
#[derive(Clone)]
pub struct Source {
    inner: Arc<SourceInner>,
}

/// Options applied when building a [`Source`].
pub struct SourceBuilder {
    adapter: Box<dyn Adapter>,
    locked: bool,
    converters: ConverterRegistry,
    cached: bool,
}

impl SourceBuilder {
    /// Refuse every write, even when the adapter supports it.
    pub fn readonly(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// Keep the last mapping read from the adapter until cleared.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn build(self) -> Source {
        Source {
            inner: Arc::new(SourceInner {
                adapter: self.adapter,
                locked: self.locked,
                converters: self.converters,
                cache_enabled: AtomicBool::new(self.cached),
                cache: ArcSwapOption::empty(),
            }),
        }
    }
}

impl Source {
    pub fn new(adapter: impl Adapter + 'static) -> Self {
        Self::builder(adapter).build()
    }

    pub fn builder(adapter: impl Adapter + 'static) -> SourceBuilder {
        SourceBuilder {
            adapter: Box::new(adapter),
            locked: false,
            converters: ConverterRegistry::new(),
            cached: false,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.adapter.name()
    }

    pub fn is_typed(&self) -> bool {
        self.inner.adapter.is_typed()
    }

    /// Not locked and backed by an adapter that can persist data.
    pub fn is_writable(&self) -> bool {
        !self.inner.locked && self.inner.adapter.supports_write()
    }

    pub fn is_cached(&self) -> bool {
        self.inner.cache_enabled.load(Ordering::Acquire)
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.inner.converters
    }

    pub fn watch_path(&self) -> Option<&Path> {
        self.inner.adapter.watch_path()
    }

    /// Whether both handles refer to the same source.
    pub fn ptr_eq(&self, other: &Source) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn enable_cache(&self) {
        self.inner.cache_enabled.store(true, Ordering::Release);
    }

    /// Stop caching and drop the current snapshot.
    pub fn disable_cache(&self) {
        self.inner.cache_enabled.store(false, Ordering::Release);
        self.inner.cache.store(None);
    }

    /// Drop the current snapshot; the next read goes to the adapter.
    pub fn clear_cache(&self) {
        self.inner.cache.store(None);
    }

    /// Current mapping of the source, from the cache when enabled.
    pub fn read(&self) -> Result<Arc<Mapping>> {
        let cached = self.is_cached();
        if cached && let Some(snapshot) = self.inner.cache.load_full() {
            return Ok(snapshot);
        }

        trace!(source = self.name(), "Reading source");
        let data = self
            .inner
            .adapter
            .read_all()
            .map_err(|e| StackError::source_read(self.name(), e))?;
        let data = Arc::new(data);

        if cached {
            self.inner.cache.store(Some(Arc::clone(&data)));
        }
        Ok(data)
    }

    /// Stored value at `path`, without converters. The root path yields the
    /// whole mapping.
    pub fn read_path(&self, path: &KeyPath) -> Result<Option<Value>> {
        let data = self.read()?;
        if path.is_root() {
            return Ok(Some(Value::Object((*data).clone())));
        }
        Ok(match get_in(&data, path.segments()) {
            PathLookup::Found(value) => Some(value.clone()),
            _ => None,
        })
    }

    pub fn contains_path(&self, path: &KeyPath) -> Result<bool> {
        let data = self.read()?;
        Ok(matches!(get_in(&data, path.segments()), PathLookup::Found(_)))
    }

    /// Sorted keys of the section at `path`, or `None` when this source has
    /// no section there.
    pub fn keys_at(&self, path: &KeyPath) -> Result<Option<Vec<String>>> {
        let data = self.read()?;
        Ok(section_in(&data, path.segments()).map(|section| {
            let mut keys: Vec<String> = section.keys().cloned().collect();
            keys.sort();
            keys
        }))
    }

    /// Value at `path` after this source's converters.
    ///
    /// A converter registered on a section key intercepts the section and
    /// receives the whole nested mapping.
    pub fn lookup(&self, path: &KeyPath) -> Result<Option<Node<SourceSection>>> {
        let Some(raw) = self.read_path(path)? else {
            return Ok(None);
        };

        if let Some(converter) = self.inner.converters.resolve(path) {
            return Ok(Some(converter.to_value(raw).into_node()));
        }

        Ok(Some(match raw {
            Value::Object(_) => Node::Section(self.section(path.clone())),
            other => Node::Value(other),
        }))
    }

    /// Assign `value` at `path` and persist the result through the adapter.
    ///
    /// The source's converter for `path`, if any, produces the stored form.
    /// Missing intermediate sections are created.
    pub fn write(&self, path: &KeyPath, value: impl Into<ConvertedValue>) -> Result<()> {
        if !self.is_writable() {
            return Err(StackError::read_only(self.name()));
        }

        let value = value.into();
        let storable = match self.inner.converters.resolve(path) {
            Some(converter) => converter.to_storable(&value),
            None => value.into_value(),
        }
        .ok_or_else(|| StackError::not_writable(path.dotted()))?;

        let mut data = (*self.read()?).clone();
        if path.is_root() {
            match storable {
                Value::Object(mapping) => data = mapping,
                _ => return Err(StackError::not_a_section("")),
            }
        } else if let Err(depth) = set_in(&mut data, path.segments(), storable) {
            let blocked: KeyPath = path.segments()[..depth].to_vec().into();
            return Err(StackError::not_a_section(blocked.dotted()));
        }

        self.persist(data)?;
        debug!(source = self.name(), key = %path, "Wrote key");
        Ok(())
    }

    /// Delete the value at `path`, returning what was stored there.
    pub fn remove(&self, path: &KeyPath) -> Result<Option<Value>> {
        if !self.is_writable() {
            return Err(StackError::read_only(self.name()));
        }

        let mut data = (*self.read()?).clone();
        let removed = remove_in(&mut data, path.segments());
        if removed.is_some() {
            self.persist(data)?;
            debug!(source = self.name(), key = %path, "Removed key");
        }
        Ok(removed)
    }

    fn persist(&self, data: Mapping) -> Result<()> {
        self.inner
            .adapter
            .write_all(&data)
            .map_err(|e| StackError::source_write(self.name(), e))?;
        if self.is_cached() {
            self.inner.cache.store(Some(Arc::new(data)));
        }
        Ok(())
    }

    /// View over the whole source.
    pub fn root(&self) -> SourceSection {
        self.section(KeyPath::root())
    }

    pub fn section(&self, path: KeyPath) -> SourceSection {
        SourceSection {
            source: self.clone(),
            path,
        }
    }

    /// Plain mapping of the source with converted objects stored back.
    pub fn dump(&self) -> Result<Mapping> {
        self.root().dump()
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name())
            .field("typed", &self.is_typed())
            .field("writable", &self.is_writable())
            .field("cached", &self.is_cached())
            .finish()
    }
}

impl<A: Adapter + 'static> From<A> for Source {
    fn from(adapter: A) -> Self {
        Source::new(adapter)
    }
}

/// Mapping view of one source, scoped to a key path.
#[derive(Debug, Clone)]
pub struct SourceSection {
    source: Source,
    path: KeyPath,
}

impl SourceSection {
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Fully qualified path of this section.
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// Delete `key` from this section.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.source.remove(&self.path.child(key))
    }
}

impl MappingNode for SourceSection {
    fn get(&self, key: &str) -> Result<Node<Self>> {
        let path = self.path.child(key);
        self.source
            .lookup(&path)?
            .ok_or_else(|| StackError::key_not_found(path.dotted()))
    }

    fn set_path(&self, path: impl Into<KeyPath>, value: impl Into<ConvertedValue>) -> Result<()> {
        self.source.write(&self.path.join(&path.into()), value)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.source
            .keys_at(&self.path)?
            .ok_or_else(|| StackError::not_a_section(self.path.dotted()))
    }

    fn dump(&self) -> Result<Mapping> {
        let mut out = Mapping::new();
        for key in self.keys()? {
            let value = match self.get(&key)? {
                Node::Value(value) => value,
                Node::Section(section) => Value::Object(section.dump()?),
                Node::Object(object) => {
                    let path = self.path.child(&key);
                    let storable = self
                        .source
                        .converters()
                        .resolve(&path)
                        .and_then(|c| c.to_storable(&ConvertedValue::Object(object)));
                    match storable {
                        Some(value) => value,
                        None => self.source.read_path(&path)?.unwrap_or(Value::Null),
                    }
                }
            };
            out.insert(key, value);
        }
        Ok(out)
    }
}
