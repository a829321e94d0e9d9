//! The stacked resolver.
//!
//! A [`StackedConfig`] is a view over a shared [`SourceList`] scoped to a key
//! path. Reading a key walks the sources from highest to lowest priority:
//!
//! - Without a strategy the first hit wins. A hit that is a section yields a
//!   new view at the extended path, which resolves each nested key through
//!   the full list again, so a partial section in a higher source falls
//!   through to lower sources for the keys it lacks.
//! - With a strategy every leaf occurrence is folded, highest priority first.
//!
//! Values read from untyped sources are coerced using the value of the same
//! key in the highest-priority typed source as a type hint.
//!
//! Writes go to the highest-priority writable source that already holds the
//! key, or to the highest-priority writable source when no source does.

use crate::coerce::coerce;
use crate::converters::ConverterRegistry;
use crate::error::{Result, StackError};
use crate::keys::KeyPath;
use crate::node::MappingNode;
use crate::source::Source;
use crate::source_list::SourceList;
use crate::sources::MemoryAdapter;
use crate::strategies::{Strategy, StrategyMap};
use crate::value::{ConvertedValue, Mapping, Node};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Whether converters take part in a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Converted,
    Raw,
}

/// Priority-ordered view over a list of sources.
#[derive(Debug, Clone)]
pub struct StackedConfig {
    sources: SourceList,
    strategies: Arc<StrategyMap>,
    converters: Arc<ConverterRegistry>,
    path: KeyPath,
}

/// Builder for [`StackedConfig`].
#[derive(Debug, Default)]
pub struct StackedConfigBuilder {
    sources: Vec<Source>,
    reverse: bool,
    strategies: StrategyMap,
    converters: ConverterRegistry,
}

impl StackedConfigBuilder {
    /// Add a source; later sources have higher priority unless reversed.
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Give the first source the highest priority.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Fold every occurrence of `key` (dotted path or bare name) with `strategy`.
    pub fn strategy(mut self, key: impl Into<String>, strategy: Strategy) -> Self {
        self.strategies.insert(key, strategy);
        self
    }

    pub fn strategies(mut self, strategies: StrategyMap) -> Self {
        self.strategies = strategies;
        self
    }

    /// Converters applied to stacked values after type inference.
    pub fn converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    pub fn build(self) -> StackedConfig {
        let list = if self.reverse {
            SourceList::reversed()
        } else {
            SourceList::new()
        };
        for source in self.sources {
            list.push(source);
        }
        StackedConfig::with_options(list, self.strategies, self.converters)
    }
}

impl StackedConfig {
    /// Stack over `sources` with no strategies or converters.
    pub fn new(sources: SourceList) -> Self {
        Self::with_options(sources, StrategyMap::new(), ConverterRegistry::new())
    }

    pub fn builder() -> StackedConfigBuilder {
        StackedConfigBuilder::default()
    }

    /// Stack over `sources`. An empty list gets one writable in-memory source.
    pub fn with_options(
        sources: SourceList,
        strategies: StrategyMap,
        converters: ConverterRegistry,
    ) -> Self {
        if sources.is_empty() {
            sources.push(Source::new(MemoryAdapter::default()));
        }
        Self {
            sources,
            strategies: Arc::new(strategies),
            converters: Arc::new(converters),
            path: KeyPath::root(),
        }
    }

    /// Fully qualified path of this view.
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// The shared source list; mutations are seen by every view.
    pub fn source_list(&self) -> &SourceList {
        &self.sources
    }

    pub fn strategies(&self) -> &StrategyMap {
        &self.strategies
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// View at the empty path over the same sources.
    pub fn root(&self) -> StackedConfig {
        self.view(KeyPath::root())
    }

    /// At least one source accepts writes.
    pub fn is_writable(&self) -> bool {
        self.sources.writable().next().is_some()
    }

    /// At least one source keeps native types.
    pub fn is_typed(&self) -> bool {
        self.sources.typed().next().is_some()
    }

    fn view(&self, path: KeyPath) -> StackedConfig {
        StackedConfig {
            sources: self.sources.clone(),
            strategies: Arc::clone(&self.strategies),
            converters: Arc::clone(&self.converters),
            path,
        }
    }

    fn resolve(&self, path: &KeyPath, mode: Mode) -> Result<Node<StackedConfig>> {
        let strategy = match mode {
            Mode::Converted => self.strategies.resolve(path),
            Mode::Raw => None,
        };

        let mut accumulator: Option<Value> = None;
        let mut occurrences = 0usize;
        let mut section_seen = false;

        for source in self.sources.iter_by_priority() {
            let Some(hit) = self.hit(&source, path, mode)? else {
                continue;
            };
            trace!(source = source.name(), key = %path, "Key found");

            let Some(strategy) = strategy else {
                debug!(
                    source = source.name(),
                    key = %path,
                    "Resolved from highest-priority source"
                );
                return Ok(hit.map_section(|()| self.view(path.clone())));
            };

            match hit {
                Node::Value(value) => {
                    occurrences += 1;
                    accumulator = Some(strategy.fold(accumulator, value));
                }
                Node::Section(()) => section_seen = true,
                Node::Object(_) => return Err(StackError::not_foldable(path.dotted())),
            }
        }

        match accumulator {
            Some(value) => {
                debug!(
                    key = %path,
                    strategy = strategy.map(Strategy::name),
                    occurrences,
                    "Folded key"
                );
                Ok(Node::Value(value))
            }
            None if section_seen => Ok(Node::Section(self.view(path.clone()))),
            None => Err(StackError::key_not_found(path.dotted())),
        }
    }

    /// Value of `path` in one source, after type inference and converters.
    fn hit(&self, source: &Source, path: &KeyPath, mode: Mode) -> Result<Option<Node<()>>> {
        let node = match mode {
            Mode::Converted => source.lookup(path)?.map(|n| n.map_section(|_| ())),
            Mode::Raw => source.read_path(path)?.map(|v| match v {
                Value::Object(_) => Node::Section(()),
                other => Node::Value(other),
            }),
        };
        let Some(node) = node else {
            return Ok(None);
        };

        let converter = match mode {
            Mode::Converted => self.converters.resolve(path),
            Mode::Raw => None,
        };

        Ok(Some(match (node, converter) {
            (Node::Section(()), Some(converter)) => match source.read_path(path)? {
                Some(raw) => converter.to_value(raw).into_node(),
                None => Node::Section(()),
            },
            (Node::Value(value), converter) => {
                let value = if source.is_typed() {
                    value
                } else {
                    self.infer_type(source, path, value)?
                };
                match converter {
                    Some(converter) => converter.to_value(value).into_node(),
                    None => Node::Value(value),
                }
            }
            (node, _) => node,
        }))
    }

    /// Coerce a value from an untyped source using the highest-priority
    /// typed source holding the same key as a leaf.
    fn infer_type(&self, untyped: &Source, path: &KeyPath, value: Value) -> Result<Value> {
        for source in self.sources.typed() {
            if source.ptr_eq(untyped) {
                continue;
            }
            match source.read_path(path)? {
                Some(Value::Object(_)) | None => continue,
                Some(hint) => {
                    let coerced = coerce(&value, &hint);
                    if coerced == value {
                        trace!(key = %path, hint = source.name(), "Value left as is");
                    } else {
                        debug!(key = %path, hint = source.name(), "Coerced untyped value");
                    }
                    return Ok(coerced);
                }
            }
        }
        Ok(value)
    }

    fn dump_with(&self, mode: Mode) -> Result<Mapping> {
        let mut out = Mapping::new();
        for key in self.keys()? {
            let path = self.path.child(&key);
            let (node, mode) = match self.resolve(&path, mode)? {
                Node::Object(_) => (self.resolve(&path, Mode::Raw)?, Mode::Raw),
                node => (node, mode),
            };
            let value = match node {
                Node::Value(value) => value,
                Node::Section(section) => Value::Object(section.dump_with(mode)?),
                Node::Object(_) => Value::Null,
            };
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl MappingNode for StackedConfig {
    fn get(&self, key: &str) -> Result<Node<Self>> {
        self.resolve(&self.path.child(key), Mode::Converted)
    }

    fn set_path(&self, path: impl Into<KeyPath>, value: impl Into<ConvertedValue>) -> Result<()> {
        let path = self.path.join(&path.into());
        let value = match self.converters.resolve(&path) {
            Some(converter) => converter
                .to_storable(&value.into())
                .map(ConvertedValue::Value)
                .ok_or_else(|| StackError::not_writable(path.dotted()))?,
            None => value.into(),
        };

        let mut exists = false;
        for source in self.sources.iter_by_priority() {
            if !source.contains_path(&path)? {
                continue;
            }
            exists = true;
            if source.is_writable() {
                debug!(source = source.name(), key = %path, "Writing to source holding key");
                return source.write(&path, value);
            }
        }

        if exists {
            return Err(StackError::no_writable_source(path.dotted()));
        }

        match self.sources.writable().next() {
            Some(source) => {
                debug!(source = source.name(), key = %path, "Writing new key");
                source.write(&path, value)
            }
            None => Err(StackError::no_writable_source(path.dotted())),
        }
    }

    /// Union of the keys every source holds at this path.
    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = BTreeSet::new();
        let mut any_section = self.path.is_root();
        for source in self.sources.iter_by_priority() {
            if let Some(found) = source.keys_at(&self.path)? {
                any_section = true;
                keys.extend(found);
            }
        }
        if !any_section {
            return Err(StackError::key_not_found(self.path.dotted()));
        }
        Ok(keys.into_iter().collect())
    }

    /// Resolved values of every key. Converted objects are dumped as their
    /// stored data.
    fn dump(&self) -> Result<Mapping> {
        self.dump_with(Mode::Converted)
    }
}
