//! Transport layer - one bounded backend call per invocation
//!
//! The poll loop only sees the `Transport` trait. Two adapters implement it:
//! - `LongPollTransport`: "events after cursor X, wait up to W seconds"
//! - `SnapshotTransport`: "full current status", diffed against the cursor
//!
//! `ScriptedTransport` replays canned replies for tests.
//!
//! Adapters never retry and never touch shared state. Cancellation surfaces as
//! `TransportError::Aborted` so callers can tell it apart from real failures.

pub mod http;
pub mod long_poll;
pub mod scripted;
pub mod snapshot;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::Increment;

pub use http::BackendClient;
pub use long_poll::LongPollTransport;
pub use scripted::ScriptedTransport;
pub use snapshot::SnapshotTransport;

/// A single bounded fetch of run progress
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch whatever progress exists past `cursor` for `run_id`.
    async fn fetch(&self, run_id: &str, cursor: u64, cancel: &CancellationToken) -> Result<Increment, TransportError>;
}

/// Errors that can occur while talking to the backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Request aborted")]
    Aborted,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_abort(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Aborted => false,
            TransportError::Http { status, .. } => *status >= 500 || *status == 429,
            TransportError::Network(_) => true,
            TransportError::InvalidResponse(_) => true,
            TransportError::InvalidRequest(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

pub(crate) fn require_run_id(run_id: &str) -> Result<(), TransportError> {
    if run_id.trim().is_empty() {
        return Err(TransportError::InvalidRequest("run id is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_distinguishable() {
        assert!(TransportError::Aborted.is_abort());
        assert!(!TransportError::Network("reset".to_string()).is_abort());
        assert!(!TransportError::Aborted.is_retryable());
    }

    #[test]
    fn test_is_retryable() {
        assert!(
            TransportError::Http {
                status: 502,
                message: "Bad gateway".to_string()
            }
            .is_retryable()
        );
        assert!(
            TransportError::Http {
                status: 429,
                message: "Too many".to_string()
            }
            .is_retryable()
        );
        assert!(
            !TransportError::Http {
                status: 404,
                message: "Not found".to_string()
            }
            .is_retryable()
        );
        assert!(TransportError::Network("timeout".to_string()).is_retryable());
        assert!(!TransportError::InvalidRequest("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::Http {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert_eq!(TransportError::Aborted.to_string(), "Request aborted");
    }

    #[test]
    fn test_require_run_id() {
        assert!(require_run_id("rk-1").is_ok());
        assert!(matches!(require_run_id("  "), Err(TransportError::InvalidRequest(_))));
    }
}
