//! Inter-poll delay computation.
//!
//! Every call is spaced by a throttle floor (`min_gap`). Consecutive empty
//! polls add `step × hits` on top, with the hit counter and the backoff both
//! capped, and the total delay capped at `max_delay`. One productive poll
//! resets the counter so latency drops back to the floor immediately.

use std::time::Duration;

use crate::config::PollConfig;

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Minimum spacing between two calls.
    pub min_gap: Duration,
    /// Subtract the call's own duration from the floor.
    pub subtract_elapsed: bool,
    /// Added per consecutive empty poll.
    pub step: Duration,
    /// Upper bound for the empty-poll component.
    pub cap: Duration,
    /// Upper bound for the hit counter.
    pub max_hits: u32,
    /// Upper bound for the total delay.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for BackoffConfig {
    fn from(config: &PollConfig) -> Self {
        Self {
            min_gap: config.min_gap(),
            subtract_elapsed: config.subtract_elapsed,
            step: config.backoff_step(),
            cap: config.backoff_cap(),
            max_hits: config.max_empty_hits,
            max_delay: config.max_delay(),
        }
    }
}

/// Empty-poll backoff state for one poll loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    empty_hits: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, empty_hits: 0 }
    }

    /// Number of consecutive empty polls recorded (capped).
    pub fn empty_hits(&self) -> u32 {
        self.empty_hits
    }

    /// Record one poll and return how long to sleep before the next.
    ///
    /// `elapsed` is how long the call itself took.
    pub fn next_delay(&mut self, has_new: bool, elapsed: Duration) -> Duration {
        if has_new {
            self.empty_hits = 0;
        } else {
            self.empty_hits = (self.empty_hits + 1).min(self.config.max_hits);
        }

        let floor = if self.config.subtract_elapsed {
            self.config.min_gap.saturating_sub(elapsed)
        } else {
            self.config.min_gap
        };

        let backoff = self.config.step.saturating_mul(self.empty_hits).min(self.config.cap);

        (floor + backoff).min(self.config.max_delay)
    }

    /// Reset the counter.
    pub fn reset(&mut self) {
        self.empty_hits = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackoffConfig {
        BackoffConfig {
            min_gap: Duration::from_millis(2000),
            subtract_elapsed: false,
            step: Duration::from_millis(500),
            cap: Duration::from_millis(5000),
            max_hits: 10,
            max_delay: Duration::from_millis(6000),
        }
    }

    #[test]
    fn test_productive_poll_uses_floor() {
        let mut backoff = Backoff::new(config());
        assert_eq!(backoff.next_delay(true, Duration::ZERO), Duration::from_millis(2000));
        assert_eq!(backoff.empty_hits(), 0);
    }

    #[test]
    fn test_first_empty_poll_adds_one_step() {
        let mut backoff = Backoff::new(config());
        assert_eq!(backoff.next_delay(false, Duration::ZERO), Duration::from_millis(2500));
        assert_eq!(backoff.empty_hits(), 1);
    }

    #[test]
    fn test_growth_is_monotonic_and_capped() {
        let mut backoff = Backoff::new(config());
        let mut previous = Duration::ZERO;
        for _ in 0..25 {
            let delay = backoff.next_delay(false, Duration::ZERO);
            assert!(delay >= previous);
            assert!(delay <= Duration::from_millis(6000));
            previous = delay;
        }
        assert_eq!(previous, Duration::from_millis(6000));
        assert_eq!(backoff.empty_hits(), 10);
    }

    #[test]
    fn test_productive_poll_resets_to_floor() {
        let mut backoff = Backoff::new(config());
        for _ in 0..7 {
            backoff.next_delay(false, Duration::ZERO);
        }
        assert_eq!(backoff.next_delay(true, Duration::ZERO), Duration::from_millis(2000));
        assert_eq!(backoff.empty_hits(), 0);
        assert_eq!(backoff.next_delay(false, Duration::ZERO), Duration::from_millis(2500));
    }

    #[test]
    fn test_backoff_component_cap() {
        let mut backoff = Backoff::new(BackoffConfig {
            max_delay: Duration::from_secs(60),
            max_hits: 100,
            ..config()
        });
        let mut delay = Duration::ZERO;
        for _ in 0..50 {
            delay = backoff.next_delay(false, Duration::ZERO);
        }
        assert_eq!(delay, Duration::from_millis(7000));
    }

    #[test]
    fn test_subtract_elapsed() {
        let mut backoff = Backoff::new(BackoffConfig {
            subtract_elapsed: true,
            ..config()
        });
        assert_eq!(
            backoff.next_delay(true, Duration::from_millis(1500)),
            Duration::from_millis(500)
        );
        // A call slower than the gap leaves no floor at all
        assert_eq!(backoff.next_delay(true, Duration::from_secs(30)), Duration::ZERO);
        assert_eq!(
            backoff.next_delay(false, Duration::from_secs(30)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(config());
        backoff.next_delay(false, Duration::ZERO);
        backoff.next_delay(false, Duration::ZERO);
        backoff.reset();
        assert_eq!(backoff.empty_hits(), 0);
    }

    #[test]
    fn test_config_from_poll_config() {
        let poll = PollConfig::default();
        let config = BackoffConfig::from(&poll);
        assert_eq!(config.min_gap, Duration::from_millis(2000));
        assert_eq!(config.step, Duration::from_millis(500));
        assert_eq!(config.cap, Duration::from_millis(5000));
        assert_eq!(config.max_hits, 10);
        assert_eq!(config.max_delay, Duration::from_millis(7000));
    }
}
