//! Local run history
//!
//! Finished runs are kept in a JSONL file, newest first, one `SavedRun` per
//! line. The store is bounded; the oldest entries fall off.

pub mod store;

pub use store::{HistoryStore, SavedRun};
