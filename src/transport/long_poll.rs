//! Cursor-based long-poll adapter

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{BackendClient, Transport, TransportError};
use crate::config::MAX_WAIT_SECS;
use crate::domain::Increment;

/// Fetches events after the cursor, letting the backend hold the call open.
#[derive(Debug, Clone)]
pub struct LongPollTransport {
    client: BackendClient,
    wait_secs: u64,
}

impl LongPollTransport {
    /// The wait bound is clamped to `1..=MAX_WAIT_SECS`.
    pub fn new(client: BackendClient, wait_secs: u64) -> Self {
        Self {
            client,
            wait_secs: wait_secs.clamp(1, MAX_WAIT_SECS),
        }
    }

    pub fn wait_secs(&self) -> u64 {
        self.wait_secs
    }
}

#[async_trait]
impl Transport for LongPollTransport {
    async fn fetch(&self, run_id: &str, cursor: u64, cancel: &CancellationToken) -> Result<Increment, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Aborted),
            body = self.client.fetch_events(run_id, cursor, self.wait_secs) => {
                Ok(Increment::from_wire(&body?))
            }
        }
    }
}
