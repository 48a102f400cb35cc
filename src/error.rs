//! Error types for sqlmorph.
//!
//! Conversion problems inside a statement are reported as
//! [`ConversionWarning`](crate::result::ConversionWarning) values, never as
//! errors. The variants here cover caller mistakes and batch-level faults.

use std::time::Duration;

use thiserror::Error;

/// The main error type for sqlmorph operations.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A dialect name that is not one of the supported four.
    #[error("Unknown dialect: '{0}'. Expected: mysql, postgresql, oracle, or tibero")]
    UnknownDialect(String),

    /// A single statement could not be converted.
    #[error("Statement {index} failed: {message}")]
    StatementFailed { index: usize, message: String },

    /// Waiting on a batch chunk exceeded the configured bound.
    #[error("Chunk {index} did not finish within {timeout:?}")]
    ChunkTimeout { index: usize, timeout: Duration },

    /// A worker task was cancelled or panicked outside statement isolation.
    #[error("Worker error: {0}")]
    Worker(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Create a per-statement failure.
    pub fn statement(index: usize, message: impl Into<String>) -> Self {
        Self::StatementFailed {
            index,
            message: message.into(),
        }
    }

    /// Create a worker failure.
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker(message.into())
    }
}

/// Result type alias for sqlmorph operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvertError::statement(3, "unbalanced parenthesis");
        assert_eq!(err.to_string(), "Statement 3 failed: unbalanced parenthesis");

        let err = ConvertError::ChunkTimeout {
            index: 2,
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Chunk 2 did not finish within 30s");
    }

    #[test]
    fn test_unknown_dialect_display() {
        let err = ConvertError::UnknownDialect("db2".into());
        assert!(err.to_string().contains("'db2'"));
    }
}
