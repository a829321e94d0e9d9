//! Stored values, converted values and lookup results.

use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A plain nested mapping of scalars and sub-mappings.
pub type Mapping = serde_json::Map<String, Value>;

/// An application object produced by a converter.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Output of a converter's `to_value`, and input of every assignment.
#[derive(Clone)]
pub enum ConvertedValue {
    /// A plain value that can be stored as is.
    Value(Value),
    /// An object that needs a converter's `to_storable` to be persisted.
    Object(Object),
}

impl ConvertedValue {
    /// Wrap an application object.
    pub fn object<T: Any + Send + Sync>(object: T) -> Self {
        Self::Object(Arc::new(object))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ConvertedValue::Value(v) => Some(v),
            ConvertedValue::Object(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ConvertedValue::Value(v) => Some(v),
            ConvertedValue::Object(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            ConvertedValue::Value(_) => None,
            ConvertedValue::Object(o) => o.downcast_ref::<T>(),
        }
    }

    pub(crate) fn into_node<S>(self) -> Node<S> {
        match self {
            ConvertedValue::Value(v) => Node::Value(v),
            ConvertedValue::Object(o) => Node::Object(o),
        }
    }
}

impl fmt::Debug for ConvertedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertedValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ConvertedValue::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<Value> for ConvertedValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Mapping> for ConvertedValue {
    fn from(mapping: Mapping) -> Self {
        Self::Value(Value::Object(mapping))
    }
}

impl From<Object> for ConvertedValue {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<&str> for ConvertedValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for ConvertedValue {
    fn from(value: String) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for ConvertedValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for ConvertedValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i32> for ConvertedValue {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<u64> for ConvertedValue {
    fn from(value: u64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for ConvertedValue {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<Vec<Value>> for ConvertedValue {
    fn from(value: Vec<Value>) -> Self {
        Self::Value(Value::Array(value))
    }
}

/// Result of looking up a key on a mapping view.
///
/// `S` is the view type returned for subsections: a source section when
/// reading a single source, a stacked config when reading a stack.
#[derive(Debug, Clone)]
pub enum Node<S> {
    /// A scalar, list or null value.
    Value(Value),
    /// A nested mapping, wrapped in a view scoped to it.
    Section(S),
    /// An object produced by a converter.
    Object(Object),
}

impl<S> Node<S> {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_section(&self) -> Option<&S> {
        match self {
            Node::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_section(self) -> Option<S> {
        match self {
            Node::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_section(&self) -> bool {
        matches!(self, Node::Section(_))
    }

    /// Borrow a converted object as its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Node::Object(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn map_section<U>(self, f: impl FnOnce(S) -> U) -> Node<U> {
        match self {
            Node::Value(v) => Node::Value(v),
            Node::Section(s) => Node::Section(f(s)),
            Node::Object(o) => Node::Object(o),
        }
    }
}

/// Outcome of walking a key path through a mapping.
#[derive(Debug, PartialEq)]
pub(crate) enum PathLookup<'a> {
    Found(&'a Value),
    Missing,
    /// A prefix of the path (of the given length) holds a non-mapping value.
    Blocked(usize),
}

/// Walk `path` through `root`.
pub(crate) fn get_in<'a>(root: &'a Mapping, path: &[String]) -> PathLookup<'a> {
    let Some((last, parents)) = path.split_last() else {
        return PathLookup::Missing;
    };

    let mut current = root;
    for (depth, key) in parents.iter().enumerate() {
        match current.get(key) {
            Some(Value::Object(next)) => current = next,
            Some(_) => return PathLookup::Blocked(depth + 1),
            None => return PathLookup::Missing,
        }
    }

    match current.get(last) {
        Some(value) => PathLookup::Found(value),
        None => PathLookup::Missing,
    }
}

/// Mapping at `path`, if every segment leads to a sub-mapping.
pub(crate) fn section_in<'a>(root: &'a Mapping, path: &[String]) -> Option<&'a Mapping> {
    if path.is_empty() {
        return Some(root);
    }
    match get_in(root, path) {
        PathLookup::Found(Value::Object(section)) => Some(section),
        _ => None,
    }
}

/// Store `value` at `path`, creating intermediate sections.
///
/// Returns `Err(depth)` when the prefix of that length holds a non-mapping.
pub(crate) fn set_in(root: &mut Mapping, path: &[String], value: Value) -> Result<(), usize> {
    let Some((last, parents)) = path.split_last() else {
        return Err(0);
    };

    let mut current = root;
    for (depth, key) in parents.iter().enumerate() {
        let entry = current
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Mapping::new()));
        match entry {
            Value::Object(next) => current = next,
            _ => return Err(depth + 1),
        }
    }

    current.insert(last.clone(), value);
    Ok(())
}

/// Remove the value at `path`, returning it.
pub(crate) fn remove_in(root: &mut Mapping, path: &[String]) -> Option<Value> {
    let (last, parents) = path.split_last()?;

    let mut current = root;
    for key in parents {
        match current.get_mut(key) {
            Some(Value::Object(next)) => current = next,
            _ => return None,
        }
    }
    current.remove(last)
}
