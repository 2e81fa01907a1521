//! Runwatch - follow long-running backend automation runs
//!
//! A run is started on an automation backend and then observed through
//! bounded polls. Each poll yields an increment that is merged into a local
//! `RunState`; a single cancellable loop per run id keeps the view current
//! until the run finishes, stalls, or times out.

pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod progress;
pub mod report;
pub mod transport;

pub use error::{Result, RunwatchError};
