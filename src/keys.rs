//! Key paths and key patterns.
//!
//! A [`KeyPath`] locates a value inside nested mappings. It can be written
//! dotted (`server.port`), with brackets (`server[port]`) or a mix of both
//! (`libraries[six].version`).
//!
//! A [`KeyPattern`] is what converters are registered under: a dotted path
//! whose segments may be `*`.

use std::fmt;

/// Sequence of keys leading from a root mapping to a nested value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// The empty path, pointing at the root mapping.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path made of one literal key, dots and brackets included.
    pub fn single(key: &str) -> Self {
        Self(vec![key.to_string()])
    }

    /// Parse a dotted and/or bracketed key string.
    ///
    /// Empty segments are dropped, so `""`, `"."` and `"[]"` all parse to the
    /// root path.
    pub fn parse(key: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut in_bracket = false;

        for c in key.chars() {
            match c {
                '[' if !in_bracket => {
                    flush(&mut segments, &mut current);
                    in_bracket = true;
                }
                ']' if in_bracket => {
                    flush(&mut segments, &mut current);
                    in_bracket = false;
                }
                '.' if !in_bracket => flush(&mut segments, &mut current),
                _ => current.push(c),
            }
        }
        flush(&mut segments, &mut current);

        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, i.e. the bare key name.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path without its last segment.
    pub fn parent(&self) -> Option<KeyPath> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// New path with `key` appended.
    pub fn child(&self, key: &str) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    /// New path with every segment of `other` appended.
    pub fn join(&self, other: &KeyPath) -> KeyPath {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// Fully qualified dotted form (`a.b.c`).
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

fn flush(segments: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        segments.push(std::mem::take(current));
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

impl From<&str> for KeyPath {
    fn from(key: &str) -> Self {
        Self::parse(key)
    }
}

impl From<String> for KeyPath {
    fn from(key: String) -> Self {
        Self::parse(&key)
    }
}

impl From<&String> for KeyPath {
    fn from(key: &String) -> Self {
        Self::parse(key)
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for KeyPath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&KeyPath> for KeyPath {
    fn from(path: &KeyPath) -> Self {
        path.clone()
    }
}

/// One segment of a [`KeyPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    Wildcard,
}

/// Dotted key pattern a converter is registered under.
///
/// A `*` segment matches exactly one key; a trailing `*` matches one or more
/// remaining keys, so `libraries.*` matches every key below `libraries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = KeyPath::parse(pattern)
            .0
            .into_iter()
            .map(|s| {
                if s == "*" {
                    PatternSegment::Wildcard
                } else {
                    PatternSegment::Literal(s)
                }
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern contains no wildcard.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, PatternSegment::Literal(_)))
    }

    /// Number of literal segments; more literal segments means more specific.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PatternSegment::Literal(_)))
            .count()
    }

    pub fn matches(&self, path: &KeyPath) -> bool {
        let keys = path.segments();
        let trailing_wildcard = matches!(self.segments.last(), Some(PatternSegment::Wildcard));

        if trailing_wildcard {
            if keys.len() < self.segments.len() {
                return false;
            }
        } else if keys.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(keys)
            .all(|(segment, key)| match segment {
                PatternSegment::Wildcard => true,
                PatternSegment::Literal(literal) => literal == key,
            })
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
