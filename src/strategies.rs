//! Merge strategies.
//!
//! A [`Strategy`] folds every occurrence of a key across the source list into
//! one value. It is called with `(accumulator, next)` pairs in descending
//! priority order; on the first call the accumulator is `None` (the EMPTY
//! marker), which is distinct from a stored `null`.

use crate::keys::KeyPath;
use crate::merge::{ArrayPolicy, deep_merge};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

type FoldFn = dyn Fn(Option<Value>, Value) -> Value + Send + Sync;

/// Named fold function.
#[derive(Clone)]
pub struct Strategy {
    name: String,
    fold: Arc<FoldFn>,
}

impl Strategy {
    pub fn new<F>(name: impl Into<String>, fold: F) -> Self
    where
        F: Fn(Option<Value>, Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            fold: Arc::new(fold),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fold(&self, accumulator: Option<Value>, next: Value) -> Value {
        (self.fold)(accumulator, next)
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Strategy").field(&self.name).finish()
    }
}

/// Strategies keyed by dotted key path or by bare key name.
#[derive(Debug, Clone, Default)]
pub struct StrategyMap {
    strategies: HashMap<String, Strategy>,
}

impl StrategyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, strategy: Strategy) -> Self {
        self.insert(key, strategy);
        self
    }

    /// Register a strategy for a dotted path (`b.c`) or a bare key (`c`).
    pub fn insert(&mut self, key: impl Into<String>, strategy: Strategy) {
        self.strategies.insert(key.into(), strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy for `path`: the full dotted path first, then the bare key.
    pub fn resolve(&self, path: &KeyPath) -> Option<&Strategy> {
        self.strategies
            .get(&path.dotted())
            .or_else(|| path.last().and_then(|key| self.strategies.get(key)))
    }
}

/// Collect every occurrence into a list, highest priority first.
pub fn collect() -> Strategy {
    Strategy::new("collect", |acc, next| match acc {
        Some(Value::Array(mut items)) => {
            items.push(next);
            Value::Array(items)
        }
        Some(other) => Value::Array(vec![other, next]),
        None => Value::Array(vec![next]),
    })
}

/// Sum numbers, concatenate strings and lists.
pub fn add() -> Strategy {
    Strategy::new("add", |acc, next| match acc {
        Some(prev) => add_values(prev, next),
        None => next,
    })
}

/// Like [`add`], but sections are deep-merged with higher priority winning.
pub fn merge() -> Strategy {
    Strategy::new("merge", |acc, next| match acc {
        Some(prev @ Value::Object(_)) if next.is_object() => {
            deep_merge(prev, next, ArrayPolicy::Concat)
        }
        Some(prev) => add_values(prev, next),
        None => next,
    })
}

/// Layer sections over each other; a higher-priority list replaces lower ones.
///
/// Other values keep the highest-priority occurrence that is not null.
pub fn overlay() -> Strategy {
    Strategy::new("overlay", |acc, next| match acc {
        Some(prev) => deep_merge(prev, next, ArrayPolicy::Replace),
        None => next,
    })
}

/// Join occurrences into one string, e.g. search paths.
pub fn join(separator: &str) -> Strategy {
    let separator = separator.to_string();
    Strategy::new(format!("join({separator})"), move |acc, next| match acc {
        Some(prev) => Value::String(format!("{}{}{}", text(&prev), separator, text(&next))),
        None => Value::String(text(&next)),
    })
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn add_values(prev: Value, next: Value) -> Value {
    match (prev, next) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64())
                && let Some(sum) = x.checked_add(y)
            {
                return Value::from(sum);
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Value::from(x + y),
                _ => Value::Number(a),
            }
        }
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Value::String(a)
        }
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (prev, next) => {
            warn!(
                accumulated = %prev,
                next = %next,
                "Cannot add values of different types, keeping accumulated value"
            );
            prev
        }
    }
}
