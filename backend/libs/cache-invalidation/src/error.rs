//! Error types for query cache operations

use thiserror::Error;

/// Query cache errors
#[derive(Error, Debug)]
pub enum InvalidationError {
    /// Cached value or key segment could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache key string does not describe a query key
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InvalidationError::InvalidKey("orders:".to_string());
        assert_eq!(err.to_string(), "Invalid cache key: orders:");
    }

    #[test]
    fn test_error_from_serde() {
        let json_err = serde_json::from_str::<String>("invalid json");
        assert!(json_err.is_err());

        let err: InvalidationError = json_err.unwrap_err().into();
        assert!(matches!(err, InvalidationError::Serialization(_)));
    }
}
