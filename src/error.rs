//! Structured error types for stack resolution.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Lookup errors
    KeyNotFound,
    NotASection,

    // Adapter errors
    SourceReadError,
    SourceWriteError,

    // Write errors
    ReadOnly,
    NoWritableSource,
    NotWritable,

    // Merge errors
    NotFoldable,
}

/// Errors surfaced by sources and stacked configs.
#[derive(Debug, Error)]
pub enum StackError {
    /// No source holds the requested key.
    #[error("Key '{key}' was not found")]
    KeyNotFound { key: String },

    /// A key path descends through a value that is not a section.
    #[error("Key '{key}' does not point to a section")]
    NotASection { key: String },

    /// The adapter behind a source could not produce a mapping.
    #[error("Failed to read source '{source_name}': {source}")]
    SourceRead {
        source_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The adapter behind a source could not persist a mapping.
    #[error("Failed to write source '{source_name}': {source}")]
    SourceWrite {
        source_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The source is locked or its adapter cannot write.
    #[error("'{source_name}' is a read-only source")]
    ReadOnly { source_name: String },

    /// No source in the list accepts the write.
    #[error("No writable source found for key '{key}'")]
    NoWritableSource { key: String },

    /// The value at this key has no storable form.
    #[error("Value for key '{key}' cannot be written back")]
    NotWritable { key: String },

    /// A merge strategy was handed a converted object.
    #[error("Key '{key}' holds a converted object that cannot be merged")]
    NotFoldable { key: String },
}

impl StackError {
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    pub fn not_a_section(key: impl Into<String>) -> Self {
        Self::NotASection { key: key.into() }
    }

    pub fn source_read(source_name: impl Into<String>, source: anyhow::Error) -> Self {
        Self::SourceRead {
            source_name: source_name.into(),
            source,
        }
    }

    pub fn source_write(source_name: impl Into<String>, source: anyhow::Error) -> Self {
        Self::SourceWrite {
            source_name: source_name.into(),
            source,
        }
    }

    pub fn read_only(source_name: impl Into<String>) -> Self {
        Self::ReadOnly {
            source_name: source_name.into(),
        }
    }

    pub fn no_writable_source(key: impl Into<String>) -> Self {
        Self::NoWritableSource { key: key.into() }
    }

    pub fn not_writable(key: impl Into<String>) -> Self {
        Self::NotWritable { key: key.into() }
    }

    pub fn not_foldable(key: impl Into<String>) -> Self {
        Self::NotFoldable { key: key.into() }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            StackError::KeyNotFound { .. } => ErrorCode::KeyNotFound,
            StackError::NotASection { .. } => ErrorCode::NotASection,
            StackError::SourceRead { .. } => ErrorCode::SourceReadError,
            StackError::SourceWrite { .. } => ErrorCode::SourceWriteError,
            StackError::ReadOnly { .. } => ErrorCode::ReadOnly,
            StackError::NoWritableSource { .. } => ErrorCode::NoWritableSource,
            StackError::NotWritable { .. } => ErrorCode::NotWritable,
            StackError::NotFoldable { .. } => ErrorCode::NotFoldable,
        }
    }

    /// Returns true for the "key is simply absent" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StackError::KeyNotFound { .. })
    }
}

/// Result type for stack operations.
pub type Result<T> = std::result::Result<T, StackError>;
