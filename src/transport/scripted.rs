//! Scripted in-memory transport for tests
//!
//! Each run id has a queue of canned replies. Once a queue is empty the
//! transport answers "still running, nothing new" at the caller's cursor.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError};
use crate::domain::Increment;

#[derive(Debug)]
enum Reply {
    Respond(Increment),
    Fail(TransportError),
    /// Resolve only after `release` is notified, ignoring cancellation
    Hold { release: Arc<Notify>, then: Increment },
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, u64)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, run_id: &str, reply: Reply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.entry(run_id.to_string()).or_default().push_back(reply);
        }
        self
    }

    pub fn respond(self, run_id: &str, increment: Increment) -> Self {
        self.push(run_id, Reply::Respond(increment))
    }

    pub fn fail(self, run_id: &str, error: TransportError) -> Self {
        self.push(run_id, Reply::Fail(error))
    }

    /// Queue a reply that stays in flight until `release` is notified.
    pub fn hold(self, run_id: &str, release: Arc<Notify>, then: Increment) -> Self {
        self.push(run_id, Reply::Hold { release, then })
    }

    /// Every call made so far as (run id, cursor)
    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, run_id: &str) -> usize {
        self.calls().iter().filter(|(id, _)| id == run_id).count()
    }

    fn next_reply(&self, run_id: &str) -> Option<Reply> {
        self.replies.lock().ok()?.get_mut(run_id)?.pop_front()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, run_id: &str, cursor: u64, cancel: &CancellationToken) -> Result<Increment, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((run_id.to_string(), cursor));
        }

        match self.next_reply(run_id) {
            Some(Reply::Respond(increment)) => Ok(increment),
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Hold { release, then }) => {
                release.notified().await;
                Ok(then)
            }
            None => Ok(Increment::running(cursor, Vec::new())),
        }
    }
}
