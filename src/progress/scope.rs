//! Lifecycle / cancellation scope
//!
//! A `ProgressScope` binds at most one live poll loop to the current run
//! identifier. Supplying a new identifier cancels the previous epoch before the
//! new loop issues its first call; supplying none (or dropping the scope) tears
//! the loop down and clears the view. Observers read `ProgressView` snapshots
//! through a `watch` channel.
//!
//! Must be used from within a tokio runtime: `watch` spawns the loop task.

use std::sync::Arc;

use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::scheduler::{EpochWriter, LoopOutcome, PollLoop, PollLoopConfig, ProgressView};
use super::terminal::TerminalDetector;
use crate::config::PollConfig;
use crate::domain::RunState;
use crate::error::Result;
use crate::transport::Transport;

struct ActiveEpoch {
    epoch: u64,
    run_id: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<LoopOutcome>>,
}

pub struct ProgressScope<T: Transport + ?Sized + 'static> {
    poll_loop: Arc<PollLoop<T>>,
    tx: Arc<watch::Sender<ProgressView>>,
    active: Option<ActiveEpoch>,
    epoch: u64,
}

impl<T: Transport + ?Sized + 'static> ProgressScope<T> {
    /// Validates `config` up front; a bad wait bound or pattern fails here.
    pub fn new(transport: Arc<T>, config: &PollConfig) -> Result<Self> {
        config.validate()?;
        let detector = TerminalDetector::from_patterns(&config.terminal_patterns)?;
        Ok(Self::with_loop(PollLoop::new(
            transport,
            detector,
            PollLoopConfig::from(config),
        )))
    }

    pub fn with_loop(poll_loop: PollLoop<T>) -> Self {
        let (tx, _rx) = watch::channel(ProgressView::idle(0));
        Self {
            poll_loop: Arc::new(poll_loop),
            tx: Arc::new(tx),
            active: None,
            epoch: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressView> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressView {
        self.tx.borrow().clone()
    }

    /// Run id of the live epoch, if any
    pub fn run_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.run_id.as_str())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Follow `run_id`, or clear when it is `None`/blank.
    pub fn set_run_id(&mut self, run_id: Option<&str>) {
        match run_id {
            Some(id) => self.watch(id),
            None => self.clear(),
        }
    }

    /// Start a fresh epoch for `run_id`, superseding any live one.
    ///
    /// Re-supplying the same id restarts it from an empty state. A blank id clears.
    pub fn watch(&mut self, run_id: &str) {
        let run_id = run_id.trim();
        if run_id.is_empty() {
            self.clear();
            return;
        }
        self.cancel_active();

        self.epoch += 1;
        let epoch = self.epoch;
        let initial = RunState::new();
        let view = ProgressView::started(epoch, run_id, initial.clone());
        self.tx.send_modify(|current| *current = view);

        let cancel = CancellationToken::new();
        let writer = EpochWriter::new(epoch, self.tx.clone());
        let poll_loop = self.poll_loop.clone();
        let id = run_id.to_string();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { poll_loop.run(id, initial, writer, token).await });

        info!("Watching run {} as epoch {}", run_id, epoch);
        self.active = Some(ActiveEpoch {
            epoch,
            run_id: run_id.to_string(),
            cancel,
            handle: Some(handle),
        });
    }

    /// Stop polling and reset the view to idle.
    pub fn clear(&mut self) {
        self.cancel_active();
        self.epoch += 1;
        let epoch = self.epoch;
        self.tx.send_modify(|current| *current = ProgressView::idle(epoch));
    }

    /// Wait for the live epoch's loop to end. `None` if nothing is live or it was already awaited.
    pub async fn wait_finished(&mut self) -> Option<LoopOutcome> {
        let handle = self.active.as_mut()?.handle.take()?;
        Some(match handle.await {
            Ok(outcome) => outcome,
            Err(e) => LoopOutcome::Failed(format!("poll task failed: {}", e)),
        })
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Cancelling run {} (epoch {})", active.run_id, active.epoch);
            active.cancel.cancel();
        }
    }
}

impl<T: Transport + ?Sized + 'static> Drop for ProgressScope<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}
