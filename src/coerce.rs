//! Best-effort type inference for values read from untyped sources.
//!
//! Untyped sources (environment variables, INI-like stores) only hold
//! strings. When a typed source holds the same key, its value serves as a
//! type hint and the raw string is converted to that type. Conversion never
//! fails: anything that cannot be converted is returned unchanged.

use serde_json::{Number, Value};

/// Convert `raw` to the type of `hint`.
///
/// Only strings are converted. Supported hints:
/// - booleans: `y`, `yes`, `t`, `true`, `on`, `1` and their negatives
/// - integers and floats: parsed after trimming whitespace
/// - lists: the string is split on `,` and every item trimmed
///
/// Strings, nulls and mappings as hints leave the value as is.
pub fn coerce(raw: &Value, hint: &Value) -> Value {
    let Value::String(text) = raw else {
        return raw.clone();
    };

    let converted = match hint {
        Value::Bool(_) => parse_bool(text).map(Value::Bool),
        Value::Number(n) if n.is_f64() => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        Value::Number(_) => parse_integer(text),
        Value::Array(_) => Some(Value::Array(
            text.split(',')
                .map(|token| Value::String(token.trim().to_string()))
                .collect(),
        )),
        Value::String(_) | Value::Null | Value::Object(_) => None,
    };

    converted.unwrap_or_else(|| raw.clone())
}

/// Parse a truth value the way command line tools usually spell them.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_integer(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    trimmed.parse::<u64>().ok().map(Value::from)
}
