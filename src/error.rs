//! Error types for Runwatch
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::transport::TransportError;

/// All error types that can occur in Runwatch
#[derive(Debug, Error)]
pub enum RunwatchError {
    /// Configuration rejected before any polling starts
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Run not found in history
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// History persistence error
    #[error("History error: {0}")]
    History(String),

    /// Backend call failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Runwatch operations
pub type Result<T> = std::result::Result<T, RunwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_error() {
        let err = RunwatchError::InvalidConfig("wait_secs must be between 1 and 60".to_string());
        assert_eq!(err.to_string(), "Invalid config: wait_secs must be between 1 and 60");
    }

    #[test]
    fn test_run_not_found_error() {
        let err = RunwatchError::RunNotFound("rk-001".to_string());
        assert_eq!(err.to_string(), "Run not found: rk-001");
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err: RunwatchError = TransportError::Network("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RunwatchError = io_err.into();
        assert!(matches!(err, RunwatchError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: RunwatchError = json_err.into();
        assert!(matches!(err, RunwatchError::Json(_)));
    }
}
