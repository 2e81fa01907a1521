//! Adaptive poll loop
//!
//! One `PollLoop::run` call drives one epoch of one run:
//! 1. Fetch past the cursor, bound to the epoch's cancellation token
//! 2. Drop the result if the epoch went stale while the call was in flight
//! 3. Merge, check terminal, check the staleness guard, publish
//! 4. Sleep the backoff delay (or the error cooldown) and repeat
//!
//! The loop owns its `RunState`; the outside world only sees published clones.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::accumulator::{apply, force_complete, has_progress};
use super::backoff::{Backoff, BackoffConfig};
use super::guard::{GuardTrip, StalenessGuard};
use super::terminal::TerminalDetector;
use crate::config::{ErrorPolicy, PollConfig};
use crate::domain::{RunState, RunStatus};
use crate::transport::Transport;

/// Where a poll loop currently is, as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No run identifier attached
    Idle,
    /// Loop is live
    Polling,
    /// Run reached a terminal state (reported or forced locally)
    Terminal,
    /// Loop gave up after a transport failure
    Failed,
}

/// Observer view of the active run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub epoch: u64,
    pub run_id: Option<String>,
    pub data: Option<RunState>,
    pub error: Option<String>,
    pub phase: PollPhase,
}

impl ProgressView {
    pub fn idle(epoch: u64) -> Self {
        Self {
            epoch,
            run_id: None,
            data: None,
            error: None,
            phase: PollPhase::Idle,
        }
    }

    pub fn started(epoch: u64, run_id: impl Into<String>, data: RunState) -> Self {
        Self {
            epoch,
            run_id: Some(run_id.into()),
            data: Some(data),
            error: None,
            phase: PollPhase::Polling,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, PollPhase::Terminal | PollPhase::Failed)
    }
}

/// How a poll loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Server reported terminal, or the heuristic fired
    Terminal(RunStatus),
    /// Staleness guard forced completion
    Stalled,
    /// Wall-clock ceiling forced completion
    TimedOut,
    /// Epoch superseded or torn down; nothing was written
    Cancelled,
    /// Transport failure with a stopping policy
    Failed(String),
}

/// Writes into the shared view only while its epoch is current.
///
/// The epoch check and the write happen under the channel's write lock, so a
/// superseded loop can never overwrite the view of the run that replaced it.
#[derive(Debug, Clone)]
pub struct EpochWriter {
    epoch: u64,
    tx: Arc<watch::Sender<ProgressView>>,
}

impl EpochWriter {
    pub fn new(epoch: u64, tx: Arc<watch::Sender<ProgressView>>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.tx.borrow().epoch == self.epoch
    }

    /// Returns false (and writes nothing) if the epoch is stale.
    pub fn publish(&self, update: impl FnOnce(&mut ProgressView)) -> bool {
        self.tx.send_if_modified(|view| {
            if view.epoch != self.epoch {
                return false;
            }
            update(view);
            true
        })
    }
}

/// Loop tuning, derived from `PollConfig`
#[derive(Debug, Clone)]
pub struct PollLoopConfig {
    pub backoff: BackoffConfig,
    pub stale_ticks: Option<u32>,
    pub timeout: Option<Duration>,
    pub error_policy: ErrorPolicy,
    pub error_cooldown: Duration,
    pub max_consecutive_errors: Option<u32>,
}

impl From<&PollConfig> for PollLoopConfig {
    fn from(config: &PollConfig) -> Self {
        Self {
            backoff: BackoffConfig::from(config),
            stale_ticks: config.stale_ticks,
            timeout: config.timeout(),
            error_policy: config.error_policy,
            error_cooldown: config.error_cooldown(),
            max_consecutive_errors: config.max_consecutive_errors,
        }
    }
}

impl Default for PollLoopConfig {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

pub struct PollLoop<T: Transport + ?Sized> {
    transport: Arc<T>,
    detector: Arc<TerminalDetector>,
    config: PollLoopConfig,
}

impl<T: Transport + ?Sized> PollLoop<T> {
    pub fn new(transport: Arc<T>, detector: TerminalDetector, config: PollLoopConfig) -> Self {
        Self {
            transport,
            detector: Arc::new(detector),
            config,
        }
    }

    pub fn config(&self) -> &PollLoopConfig {
        &self.config
    }

    /// Poll `run_id` until terminal, cancelled, or failed.
    pub async fn run(
        &self,
        run_id: String,
        initial: RunState,
        writer: EpochWriter,
        cancel: CancellationToken,
    ) -> LoopOutcome {
        let started = Instant::now();
        let mut state = initial;
        let mut backoff = Backoff::new(self.config.backoff.clone());
        let mut guard = StalenessGuard::new(self.config.stale_ticks, self.config.timeout);
        let mut consecutive_errors = 0u32;

        info!("Polling run {} (epoch {})", run_id, writer.epoch());

        loop {
            if cancel.is_cancelled() || !writer.is_current() {
                return self.cancelled(&run_id, &writer);
            }

            let call_started = Instant::now();
            let cursor_before = state.cursor;

            match self.transport.fetch(&run_id, cursor_before, &cancel).await {
                Ok(increment) => {
                    // Late result for a superseded epoch: discard it
                    if cancel.is_cancelled() || !writer.is_current() {
                        return self.cancelled(&run_id, &writer);
                    }
                    consecutive_errors = 0;

                    let has_new = has_progress(&increment, cursor_before);
                    state = apply(state, &increment, &self.detector, Utc::now());
                    debug!(
                        "Run {}: +{} events, cursor {} -> {}, {} steps",
                        run_id,
                        increment.events.len(),
                        cursor_before,
                        state.cursor,
                        state.steps.len()
                    );

                    if state.is_terminal() {
                        info!("Run {} finished with status {}", run_id, state.status);
                        let status = state.status;
                        return self.finish(&run_id, &writer, state, LoopOutcome::Terminal(status), true);
                    }

                    if let Some(trip) = guard.observe(state.steps.len(), started.elapsed()) {
                        return self.force_finish(&run_id, &writer, state, trip, true);
                    }

                    let snapshot = state.clone();
                    let published = writer.publish(|view| {
                        view.data = Some(snapshot);
                        view.error = None;
                    });
                    if !published {
                        return self.cancelled(&run_id, &writer);
                    }

                    let delay = backoff.next_delay(has_new, call_started.elapsed());
                    debug!(
                        "Run {}: next poll in {:?} (empty hits {})",
                        run_id,
                        delay,
                        backoff.empty_hits()
                    );
                    if !pause(delay, &cancel).await {
                        return self.cancelled(&run_id, &writer);
                    }
                }
                Err(e) if e.is_abort() => {
                    return self.cancelled(&run_id, &writer);
                }
                Err(e) => {
                    if cancel.is_cancelled() || !writer.is_current() {
                        return self.cancelled(&run_id, &writer);
                    }
                    consecutive_errors += 1;
                    let message = e.to_string();

                    let limit_hit = self
                        .config
                        .max_consecutive_errors
                        .is_some_and(|max| consecutive_errors >= max);
                    let fatal = self.config.error_policy == ErrorPolicy::Stop || !e.is_retryable() || limit_hit;

                    if fatal {
                        warn!("Run {}: giving up after error: {}", run_id, message);
                        let published = writer.publish(|view| {
                            view.error = Some(message.clone());
                            view.phase = PollPhase::Failed;
                        });
                        if !published {
                            return self.cancelled(&run_id, &writer);
                        }
                        return LoopOutcome::Failed(message);
                    }

                    warn!(
                        "Run {}: fetch failed ({} in a row), retrying in {:?}: {}",
                        run_id, consecutive_errors, self.config.error_cooldown, message
                    );
                    if !writer.publish(|view| view.error = Some(message)) {
                        return self.cancelled(&run_id, &writer);
                    }

                    if let Some(trip) = guard.check_timeout(started.elapsed()) {
                        return self.force_finish(&run_id, &writer, state, trip, false);
                    }

                    if !pause(self.config.error_cooldown, &cancel).await {
                        return self.cancelled(&run_id, &writer);
                    }
                }
            }
        }
    }

    fn force_finish(
        &self,
        run_id: &str,
        writer: &EpochWriter,
        state: RunState,
        trip: GuardTrip,
        clear_error: bool,
    ) -> LoopOutcome {
        info!("Run {}: completing locally, {}", run_id, trip);
        let state = force_complete(state, Utc::now());
        let outcome = match trip {
            GuardTrip::Stalled { .. } => LoopOutcome::Stalled,
            GuardTrip::TimedOut { .. } => LoopOutcome::TimedOut,
        };
        self.finish(run_id, writer, state, outcome, clear_error)
    }

    /// Publish the final state. `clear_error` is set when the last fetch succeeded.
    fn finish(
        &self,
        run_id: &str,
        writer: &EpochWriter,
        state: RunState,
        outcome: LoopOutcome,
        clear_error: bool,
    ) -> LoopOutcome {
        let published = writer.publish(|view| {
            view.data = Some(state);
            view.phase = PollPhase::Terminal;
            if clear_error {
                view.error = None;
            }
        });
        if published {
            outcome
        } else {
            self.cancelled(run_id, writer)
        }
    }

    fn cancelled(&self, run_id: &str, writer: &EpochWriter) -> LoopOutcome {
        debug!("Run {}: epoch {} superseded, stopping", run_id, writer.epoch());
        LoopOutcome::Cancelled
    }
}

/// Sleep unless cancelled first; returns false on cancellation.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
