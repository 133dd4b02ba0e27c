//! Error types for Tessera operations.

use thiserror::Error;

/// Result type alias using Tessera's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema definition rejected at construction.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Index descriptor or manager metadata could not be understood.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Vector index type other than the ones this crate ships.
    #[error("unsupported index type: {0}")]
    UnsupportedIndexType(String),

    /// Filter or sorter DSL could not be parsed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A filter was supplied but no candidate bitmap could be computed.
    #[error("filter bitmap unavailable: {0}")]
    BitmapUnavailable(String),

    /// Vector dimension mismatch between index and input.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A vector or row value the engine cannot store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Field payload JSON rejected.
    #[error("invalid fields: {0}")]
    InvalidFields(String),

    /// IO error during storage operations.
    #[error("io error: {0}")]
    IoError(String),

    /// On-disk data failed a checksum or structural check.
    #[error("data corrupted: {0}")]
    Corrupted(String),

    /// Label not present in the vector index.
    #[error("label not found: {0}")]
    NotFound(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DimensionMismatch {
            expected: 384,
            got: 512,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 384, got 512");
    }

    #[test]
    fn test_query_error_display() {
        let err = Error::InvalidQuery("unknown op: near".into());
        assert_eq!(err.to_string(), "invalid query: unknown op: near");
    }
}
