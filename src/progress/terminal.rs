//! Terminal detection
//!
//! Two signals, OR-ed together:
//! 1. Authoritative: the increment says `completed`/`error` or carries an end time.
//! 2. Heuristic: the newest step's name + message matches terminal vocabulary.
//!
//! Some step emitters finish the workflow without ever flipping the envelope
//! status, so the heuristic may stop polling early; it never keeps it going.

use regex::{Regex, RegexBuilder};

use crate::config::default_terminal_patterns;
use crate::domain::{Increment, RunState, StepEvent};
use crate::error::{Result, RunwatchError};

#[derive(Debug, Clone)]
pub struct TerminalDetector {
    vocabulary: Option<Regex>,
}

impl TerminalDetector {
    /// Build from case-insensitive patterns. An empty list disables the heuristic.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self { vocabulary: None });
        }

        let joined = patterns
            .iter()
            .map(|p| format!("(?:{})", p.as_ref()))
            .collect::<Vec<_>>()
            .join("|");

        let vocabulary = RegexBuilder::new(&joined)
            .case_insensitive(true)
            .build()
            .map_err(|e| RunwatchError::InvalidConfig(format!("bad terminal pattern: {}", e)))?;

        Ok(Self {
            vocabulary: Some(vocabulary),
        })
    }

    /// Authoritative signal only
    pub fn is_authoritative(&self, increment: &Increment) -> bool {
        increment.reports_terminal()
    }

    /// Heuristic signal only: inspects the most recent step
    pub fn looks_terminal(&self, steps: &[StepEvent]) -> bool {
        let (Some(vocabulary), Some(last)) = (&self.vocabulary, steps.last()) else {
            return false;
        };
        let text = format!("{} {}", last.name, last.message.as_deref().unwrap_or(""));
        vocabulary.is_match(&text)
    }

    /// `state` is the merged state, including the increment's events.
    pub fn is_terminal(&self, state: &RunState, increment: &Increment) -> bool {
        self.is_authoritative(increment) || self.looks_terminal(&state.steps)
    }
}

impl Default for TerminalDetector {
    fn default() -> Self {
        let vocabulary = RegexBuilder::new(&default_terminal_patterns().join("|"))
            .case_insensitive(true)
            .build()
            .ok();
        Self { vocabulary }
    }
}
