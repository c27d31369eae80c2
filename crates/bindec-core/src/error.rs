//! Error types for the bindec-core library.
//!
//! Errors fall into three families that callers treat differently:
//! schema errors (raised while definitions are derived, before any byte is
//! read), schema violations (a valid schema meets data it cannot handle) and
//! truncated input, which is the only recoverable condition.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bindec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all bindec operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on the input cursor or output sink
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or semantically invalid field definition
    #[error("structure: \"{path}\", field: \"{field}\": {message}")]
    Schema {
        /// Qualified name of the structure owning the field
        path: String,
        /// Name of the offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// Invalid value in a `DEFAULTS` section
    #[error("invalid default value for \"{option}\": {message}")]
    DefaultValue {
        /// Name of the `default_*` option
        option: String,
        /// What is wrong with it
        message: String,
    },

    /// A valid schema produced an impossible condition while decoding
    #[error("field \"{field}\": {message}")]
    SchemaViolation {
        /// Qualified field name, including array index when relevant
        field: String,
        /// What went wrong
        message: String,
    },

    /// Input ended in the middle of a field
    #[error("unexpected end of input at offset {offset:#x}: requested {requested} bytes, {available} available")]
    TruncatedInput {
        /// Absolute offset where the read started
        offset: u64,
        /// Number of bytes requested
        requested: u64,
        /// Number of bytes actually available
        available: u64,
    },

    /// Expression text outside the supported grammar
    #[error("invalid expression \"{text}\" at position {position}: {details}")]
    Expression {
        /// Source text of the expression
        text: String,
        /// Character position of the problem
        position: usize,
        /// Detailed description
        details: String,
    },

    /// Expression failed while being evaluated
    #[error("{0}")]
    Evaluation(String),

    /// Schema or config document is not valid JSON
    #[error("invalid document: {message}{context}")]
    Document {
        /// Parser message
        message: String,
        /// Lines preceding the error location
        context: String,
    },

    /// Requested root structure is unusable
    #[error("{0}")]
    InvalidRoot(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new schema error
    pub fn schema(
        path: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Schema {
            path: path.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new default value error
    pub fn default_value(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DefaultValue {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Creates a new schema violation error
    pub fn violation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new truncated input error
    pub fn truncated(offset: u64, requested: u64, available: u64) -> Self {
        Self::TruncatedInput {
            offset,
            requested,
            available,
        }
    }

    /// Creates a new expression syntax error
    pub fn expression(text: impl Into<String>, position: usize, details: impl Into<String>) -> Self {
        Self::Expression {
            text: text.into(),
            position,
            details: details.into(),
        }
    }

    /// Creates a new evaluation error
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Creates a new root selection error
    pub fn invalid_root(msg: impl Into<String>) -> Self {
        Self::InvalidRoot(msg.into())
    }

    /// Returns true if decoding may stop here and still keep its output
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = Error::schema("main.header", "magic", "size parameter is not a positive integer");
        let text = err.to_string();
        assert!(text.contains("structure: \"main.header\""));
        assert!(text.contains("field: \"magic\""));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::truncated(16, 4, 1).is_recoverable());
        assert!(!Error::violation("u0", "no union variant selected").is_recoverable());
        assert!(!Error::schema("main", "x", "bad").is_recoverable());
    }
}
