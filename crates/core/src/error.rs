//! Error types for rowflow.
//!
//! Public row-model operations never surface these to the host: they are
//! produced by internal lookups and fallible constructors, then logged.

use thiserror::Error;

/// Result type alias for rowflow operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for row tree operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No live entity carries the given id.
    #[error("Row not found for id: {id}")]
    RowNotFound { id: String },
    /// No live entity holds the given record object.
    #[error("Row not found for record (identity lookup over {scanned} leaves)")]
    RecordNotFound { scanned: usize },
    /// Two live entities were assigned the same id.
    #[error("Duplicate row id: {id}")]
    DuplicateId { id: String },
    /// The supplied dataset is not a list of records.
    #[error("Invalid dataset: {message}")]
    InvalidDataset { message: String },
    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a row not found error.
    pub fn row_not_found(id: impl Into<String>) -> Self {
        Error::RowNotFound { id: id.into() }
    }

    /// Creates a record not found error.
    pub fn record_not_found(scanned: usize) -> Self {
        Error::RecordNotFound { scanned }
    }

    /// Creates a duplicate id error.
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Error::DuplicateId { id: id.into() }
    }

    /// Creates an invalid dataset error.
    pub fn invalid_dataset(message: impl Into<String>) -> Self {
        Error::InvalidDataset {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::row_not_found("42");
        assert!(err.to_string().contains("42"));

        let err = Error::duplicate_id("a");
        assert!(err.to_string().contains("Duplicate"));

        let err = Error::invalid_dataset("expected array");
        assert!(err.to_string().contains("expected array"));
    }

    #[test]
    fn test_error_from_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Config(_)));
    }
}
