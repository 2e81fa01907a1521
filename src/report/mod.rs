//! Presentation helpers for finished and in-flight runs

mod category;
mod highlights;

pub use category::{Category, categorize, group_by_category};
pub use highlights::{HighlightKey, Highlights, collect_highlights};
