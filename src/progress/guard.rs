//! Staleness and timeout guard
//!
//! Checked once per successful poll. Trips when the step count has not grown
//! for `stale_ticks` consecutive polls, or when the run has been watched for
//! longer than `timeout`. Either way the client stops polling; nothing is
//! claimed about the job on the server.

use std::time::Duration;

/// Why the guard tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardTrip {
    /// Step count unchanged for this many consecutive polls
    Stalled { ticks: u32 },
    /// Run exceeded the wall-clock ceiling
    TimedOut { elapsed: Duration },
}

impl std::fmt::Display for GuardTrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardTrip::Stalled { ticks } => write!(f, "no new steps for {} polls", ticks),
            GuardTrip::TimedOut { elapsed } => write!(f, "timed out after {}s", elapsed.as_secs()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StalenessGuard {
    stale_ticks: Option<u32>,
    timeout: Option<Duration>,
    last_count: usize,
    unchanged: u32,
}

impl StalenessGuard {
    /// `None` disables the corresponding check.
    pub fn new(stale_ticks: Option<u32>, timeout: Option<Duration>) -> Self {
        Self {
            stale_ticks,
            timeout,
            last_count: 0,
            unchanged: 0,
        }
    }

    /// Consecutive polls without step growth so far
    pub fn unchanged(&self) -> u32 {
        self.unchanged
    }

    /// Record the step count after a successful poll.
    pub fn observe(&mut self, step_count: usize, elapsed: Duration) -> Option<GuardTrip> {
        if step_count == self.last_count {
            self.unchanged = self.unchanged.saturating_add(1);
        } else {
            self.last_count = step_count;
            self.unchanged = 0;
        }

        if let Some(limit) = self.stale_ticks {
            if self.unchanged >= limit {
                return Some(GuardTrip::Stalled { ticks: self.unchanged });
            }
        }

        self.check_timeout(elapsed)
    }

    /// Timeout check alone, for iterations that did not produce a response.
    pub fn check_timeout(&self, elapsed: Duration) -> Option<GuardTrip> {
        match self.timeout {
            Some(ceiling) if elapsed >= ceiling => Some(GuardTrip::TimedOut { elapsed }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_after_window() {
        let mut guard = StalenessGuard::new(Some(10), None);
        for _ in 0..9 {
            assert_eq!(guard.observe(0, Duration::ZERO), None);
        }
        assert_eq!(
            guard.observe(0, Duration::ZERO),
            Some(GuardTrip::Stalled { ticks: 10 })
        );
    }

    #[test]
    fn test_growth_resets_window() {
        let mut guard = StalenessGuard::new(Some(3), None);
        assert_eq!(guard.observe(0, Duration::ZERO), None);
        assert_eq!(guard.observe(0, Duration::ZERO), None);
        assert_eq!(guard.observe(2, Duration::ZERO), None);
        assert_eq!(guard.unchanged(), 0);
        assert_eq!(guard.observe(2, Duration::ZERO), None);
        assert_eq!(guard.observe(2, Duration::ZERO), None);
        assert!(matches!(guard.observe(2, Duration::ZERO), Some(GuardTrip::Stalled { .. })));
    }

    #[test]
    fn test_timeout_independent_of_steps() {
        let mut guard = StalenessGuard::new(Some(10), Some(Duration::from_secs(180)));
        assert_eq!(guard.observe(1, Duration::from_secs(179)), None);
        assert_eq!(
            guard.observe(2, Duration::from_secs(180)),
            Some(GuardTrip::TimedOut {
                elapsed: Duration::from_secs(180)
            })
        );
    }

    #[test]
    fn test_disabled_checks_never_trip() {
        let mut guard = StalenessGuard::new(None, None);
        for _ in 0..100 {
            assert_eq!(guard.observe(0, Duration::from_secs(86_400)), None);
        }
    }

    #[test]
    fn test_check_timeout() {
        let guard = StalenessGuard::new(None, Some(Duration::from_secs(5)));
        assert!(guard.check_timeout(Duration::from_secs(4)).is_none());
        assert!(guard.check_timeout(Duration::from_secs(5)).is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(GuardTrip::Stalled { ticks: 10 }.to_string(), "no new steps for 10 polls");
        assert_eq!(
            GuardTrip::TimedOut {
                elapsed: Duration::from_secs(181)
            }
            .to_string(),
            "timed out after 181s"
        );
    }
}
