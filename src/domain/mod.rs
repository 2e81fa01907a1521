//! Domain types for Runwatch
//!
//! - RunState / StepEvent: the accumulated client-side view of a run
//! - Increment: one normalized response from the backend

pub mod increment;
pub mod run;

pub use increment::Increment;
pub use run::{RunState, RunStatus, StepEvent, StepStatus};
