//! Run state accumulation
//!
//! `apply` is a pure merge of one increment into the previous state. It is not
//! idempotent: applying the same increment twice appends its events twice, so
//! the poll loop applies each increment exactly once.

use chrono::{DateTime, Utc};

use super::terminal::TerminalDetector;
use crate::domain::{Increment, RunState, RunStatus};

/// Merge `increment` into `previous`.
///
/// - events are appended in server order, never deduplicated
/// - the cursor only moves forward
/// - once terminal, status and end time are frozen
/// - `result`/`params` carry through unless the increment replaces them
pub fn apply(previous: RunState, increment: &Increment, detector: &TerminalDetector, now: DateTime<Utc>) -> RunState {
    let mut state = previous;

    state.steps.extend(increment.events.iter().cloned());

    if let Some(next) = increment.next_cursor {
        state.cursor = state.cursor.max(next);
    }

    if let Some(result) = &increment.result {
        state.result = Some(result.clone());
    }
    if let Some(params) = &increment.params {
        state.params = Some(params.clone());
    }

    if state.is_terminal() {
        return state;
    }

    if detector.is_terminal(&state, increment) {
        state.status = match increment.status {
            Some(RunStatus::Error) => RunStatus::Error,
            _ => RunStatus::Completed,
        };
        state.end_time = Some(increment.end_time.unwrap_or(now));
    }

    state
}

/// Locally declare the run complete; keeps an existing end time.
pub fn force_complete(previous: RunState, now: DateTime<Utc>) -> RunState {
    let mut state = previous;
    if !state.is_terminal() {
        state.status = RunStatus::Completed;
    }
    if state.end_time.is_none() {
        state.end_time = Some(now);
    }
    state
}

/// Did this increment make progress relative to the cursor it was fetched with?
pub fn has_progress(increment: &Increment, cursor_before: u64) -> bool {
    !increment.events.is_empty() || increment.next_cursor.is_some_and(|c| c > cursor_before)
}
