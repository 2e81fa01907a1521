//! Fixed-interval snapshot adapter
//!
//! Re-fetches the whole run each time and reports only the steps past the
//! cursor, so the poll loop can treat it exactly like the long-poll adapter.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{BackendClient, Transport, TransportError};
use crate::domain::Increment;

#[derive(Debug, Clone)]
pub struct SnapshotTransport {
    client: BackendClient,
}

impl SnapshotTransport {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for SnapshotTransport {
    async fn fetch(&self, run_id: &str, cursor: u64, cancel: &CancellationToken) -> Result<Increment, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Aborted),
            body = self.client.fetch_progress(run_id) => {
                Ok(Increment::from_snapshot(&body?, cursor))
            }
        }
    }
}
