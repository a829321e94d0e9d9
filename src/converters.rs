//! Per-key value converters.
//!
//! A [`Converter`] turns a stored value into an application value on read
//! (`to_value`) and back on write (`to_storable`). Converters are registered
//! under a [`KeyPattern`] in a [`ConverterRegistry`], which picks the most
//! specific converter for a fully qualified key:
//!
//! 1. an exact literal pattern (`libraries.six`)
//! 2. the wildcard pattern with the most literal segments (`libraries.*`)
//! 3. on ties, the pattern registered first
//!
//! A converter registered on a section key receives the whole nested mapping,
//! which is how subtrees become constructed objects.

use crate::coerce::parse_bool;
use crate::keys::{KeyPath, KeyPattern};
use crate::value::ConvertedValue;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type ToValueFn = dyn Fn(Value) -> ConvertedValue + Send + Sync;
type ToStorableFn = dyn Fn(&ConvertedValue) -> Option<Value> + Send + Sync;

/// Default format of the [`dates`] converter.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default format of the [`datetimes`] converter.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Bidirectional transform bound to a key pattern.
#[derive(Clone)]
pub struct Converter {
    pattern: KeyPattern,
    to_value: Arc<ToValueFn>,
    to_storable: Option<Arc<ToStorableFn>>,
}

impl Converter {
    /// Converter without a way back; keys it matches cannot be assigned.
    pub fn read_only<F>(pattern: &str, to_value: F) -> Self
    where
        F: Fn(Value) -> ConvertedValue + Send + Sync + 'static,
    {
        Self {
            pattern: KeyPattern::new(pattern),
            to_value: Arc::new(to_value),
            to_storable: None,
        }
    }

    /// Add or replace the write-back half of the converter.
    pub fn with_storable<F>(mut self, to_storable: F) -> Self
    where
        F: Fn(&ConvertedValue) -> Option<Value> + Send + Sync + 'static,
    {
        self.to_storable = Some(Arc::new(to_storable));
        self
    }

    /// Value-to-value converter.
    pub fn map<R, W>(pattern: &str, read: R, write: W) -> Self
    where
        R: Fn(Value) -> Value + Send + Sync + 'static,
        W: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::read_only(pattern, move |v| ConvertedValue::Value(read(v))).with_storable(
            move |v| match v {
                ConvertedValue::Value(v) => Some(write(v.clone())),
                ConvertedValue::Object(_) => None,
            },
        )
    }

    /// Converter that builds an application object from the stored value.
    ///
    /// When `load` returns `None` the stored value is passed through
    /// unconverted. Assigning a plain value to the key stores it as is.
    pub fn object<T, L, U>(pattern: &str, load: L, unload: U) -> Self
    where
        T: Any + Send + Sync,
        L: Fn(&Value) -> Option<T> + Send + Sync + 'static,
        U: Fn(&T) -> Value + Send + Sync + 'static,
    {
        Self::read_only(pattern, move |v| match load(&v) {
            Some(object) => ConvertedValue::object(object),
            None => ConvertedValue::Value(v),
        })
        .with_storable(move |v| match v {
            ConvertedValue::Value(v) => Some(v.clone()),
            ConvertedValue::Object(o) => o.downcast_ref::<T>().map(&unload),
        })
    }

    /// Object converter driven by the type's serde implementations.
    ///
    /// Objects that fail to serialize are not writable.
    pub fn serde<T>(pattern: &str) -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        Self::read_only(pattern, |v| {
            match serde_json::from_value::<T>(v.clone()) {
                Ok(object) => ConvertedValue::object(object),
                Err(_) => ConvertedValue::Value(v),
            }
        })
        .with_storable(|v| match v {
            ConvertedValue::Value(v) => Some(v.clone()),
            ConvertedValue::Object(o) => o
                .downcast_ref::<T>()
                .and_then(|t| serde_json::to_value(t).ok()),
        })
    }

    pub fn pattern(&self) -> &KeyPattern {
        &self.pattern
    }

    /// Whether converted values can be written back.
    pub fn is_writable(&self) -> bool {
        self.to_storable.is_some()
    }

    pub fn to_value(&self, stored: Value) -> ConvertedValue {
        (self.to_value)(stored)
    }

    /// Storable form of `value`, or `None` when it cannot be persisted.
    pub fn to_storable(&self, value: &ConvertedValue) -> Option<Value> {
        self.to_storable.as_ref().and_then(|f| f(value))
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("pattern", &self.pattern.as_str())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Ordered set of converters resolved by key specificity.
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    converters: Vec<Converter>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, converter: Converter) -> Self {
        self.register(converter);
        self
    }

    /// Add a converter. A converter with an identical pattern is replaced.
    pub fn register(&mut self, converter: Converter) {
        if let Some(existing) = self
            .converters
            .iter_mut()
            .find(|c| c.pattern == converter.pattern)
        {
            *existing = converter;
        } else {
            self.converters.push(converter);
        }
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Most specific converter for the fully qualified `path`.
    pub fn resolve(&self, path: &KeyPath) -> Option<&Converter> {
        if let Some(literal) = self
            .converters
            .iter()
            .find(|c| c.pattern.is_literal() && c.pattern.matches(path))
        {
            return Some(literal);
        }

        let mut best: Option<&Converter> = None;
        for converter in self.converters.iter().filter(|c| c.pattern.matches(path)) {
            match best {
                Some(b) if b.pattern.specificity() >= converter.pattern.specificity() => {}
                _ => best = Some(converter),
            }
        }
        best
    }
}

impl FromIterator<Converter> for ConverterRegistry {
    fn from_iter<I: IntoIterator<Item = Converter>>(iter: I) -> Self {
        let mut registry = Self::new();
        for converter in iter {
            registry.register(converter);
        }
        registry
    }
}

/// Booleans stored as strings (`"yes"`, `"0"`, `"True"`, ...).
///
/// Written back as `"True"` / `"False"`.
pub fn bools(pattern: &str) -> Converter {
    Converter::map(
        pattern,
        |v| match v {
            Value::String(s) => match parse_bool(&s) {
                Some(b) => Value::Bool(b),
                None => Value::String(s),
            },
            other => other,
        },
        |v| match v {
            Value::Bool(true) => Value::from("True"),
            Value::Bool(false) => Value::from("False"),
            other => other,
        },
    )
}

/// Dates stored as strings, converted to [`NaiveDate`] objects.
pub fn dates(pattern: &str, format: Option<&str>) -> Converter {
    let format = format.unwrap_or(DATE_FORMAT).to_string();
    let write_format = format.clone();
    Converter::object(
        pattern,
        move |v| v.as_str().and_then(|s| NaiveDate::parse_from_str(s, &format).ok()),
        move |d: &NaiveDate| Value::from(d.format(&write_format).to_string()),
    )
}

/// Timestamps stored as strings, converted to [`NaiveDateTime`] objects.
pub fn datetimes(pattern: &str, format: Option<&str>) -> Converter {
    let format = format.unwrap_or(DATETIME_FORMAT).to_string();
    let write_format = format.clone();
    Converter::object(
        pattern,
        move |v| {
            v.as_str()
                .and_then(|s| NaiveDateTime::parse_from_str(s, &format).ok())
        },
        move |d: &NaiveDateTime| Value::from(d.format(&write_format).to_string()),
    )
}
