//! Exponential backoff for offline retries
//!
//! When the CMS is unreachable the collection loop retries quickly at
//! first and backs off toward the normal collection interval: 30 s, 60 s,
//! 120 s, ... capped at the configured interval. A successful cycle
//! resets the ladder.

use std::time::Duration;

/// Initial retry delay when entering offline mode.
pub const INITIAL_DELAY_SECS: u64 = 30;

/// Doubling backoff with a movable cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempts: u32,
}

impl Backoff {
    /// Backoff capped at the normal collection interval.
    pub fn new(cap: Duration) -> Self {
        Self {
            base: Duration::from_secs(INITIAL_DELAY_SECS),
            cap: cap.max(Duration::from_secs(INITIAL_DELAY_SECS)),
            attempts: 0,
        }
    }

    /// Delay before the next retry; each call counts as one failed attempt.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempts.min(16);
        self.attempts = self.attempts.saturating_add(1);
        let delay = self
            .base
            .saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.cap)
    }

    /// Current delay without advancing the ladder.
    pub fn current_delay(&self) -> Duration {
        let exp = self.attempts.saturating_sub(1).min(16);
        self.base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.cap)
    }

    /// Move the cap, e.g. when the CMS changes the collect interval.
    pub fn set_cap(&mut self, cap: Duration) {
        self.cap = cap.max(self.base);
    }

    /// Back to the initial delay after a successful cycle.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
