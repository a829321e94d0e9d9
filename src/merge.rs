//! Deep merge of nested values.
//!
//! Used by the `merge` strategy to combine occurrences of one key across
//! sources. The higher-priority value wins on scalar conflicts; sections are
//! merged key by key.

use serde_json::Value;

/// How two lists holding the same key are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayPolicy {
    /// The higher-priority list replaces the lower one.
    Replace,
    /// Higher-priority items first, then the lower-priority items.
    #[default]
    Concat,
}

/// Deep merge two values, with `higher` taking precedence over `lower`.
///
/// - Sections are merged recursively: keys in `higher` override keys in `lower`
/// - Lists follow `arrays`
/// - A null in `higher` keeps the `lower` value (null means "not specified")
/// - Any other combination: `higher` replaces `lower` entirely
///
/// # Example
/// ```
/// use serde_json::json;
/// use config_stacker::merge::{ArrayPolicy, deep_merge};
///
/// let lower = json!({"server": {"port": 8080, "host": "localhost"}, "paths": ["/a"]});
/// let higher = json!({"server": {"port": 9000}, "paths": ["/b"]});
/// let merged = deep_merge(higher, lower, ArrayPolicy::Concat);
/// assert_eq!(
///     merged,
///     json!({"server": {"port": 9000, "host": "localhost"}, "paths": ["/b", "/a"]})
/// );
/// ```
pub fn deep_merge(higher: Value, lower: Value, arrays: ArrayPolicy) -> Value {
    match (higher, lower) {
        (Value::Object(higher_map), Value::Object(mut lower_map)) => {
            for (key, higher_value) in higher_map {
                let merged = match lower_map.remove(&key) {
                    Some(lower_value) => deep_merge(higher_value, lower_value, arrays),
                    None => higher_value,
                };
                lower_map.insert(key, merged);
            }
            Value::Object(lower_map)
        }
        (Value::Array(mut higher_items), Value::Array(lower_items))
            if arrays == ArrayPolicy::Concat =>
        {
            higher_items.extend(lower_items);
            Value::Array(higher_items)
        }
        (Value::Null, lower) => lower,
        (higher, _) => higher,
    }
}
