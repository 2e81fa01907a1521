//! Run-progress synchronization
//!
//! Tracks one server-side run through an unreliable, incrementally-updating
//! transport and keeps a locally consistent, append-only view of it:
//! - accumulator: pure merge of increments into `RunState`
//! - terminal: authoritative + heuristic end-of-run detection
//! - backoff: throttle floor plus empty-poll backoff
//! - guard: staleness / wall-clock ceiling
//! - scheduler: the cooperative poll loop for one epoch
//! - scope: binds one epoch to the current run id, cancels on change

pub mod accumulator;
pub mod backoff;
pub mod guard;
pub mod scheduler;
pub mod scope;
pub mod terminal;

pub use accumulator::{apply, force_complete, has_progress};
pub use backoff::{Backoff, BackoffConfig};
pub use guard::{GuardTrip, StalenessGuard};
pub use scheduler::{EpochWriter, LoopOutcome, PollLoop, PollLoopConfig, PollPhase, ProgressView};
pub use scope::ProgressScope;
pub use terminal::TerminalDetector;
