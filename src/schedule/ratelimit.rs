//! Per-layout play history and rate limiting
//!
//! A layout with `maxPlaysPerHour = N` passes two gates before it may play
//! again: fewer than N plays in the trailing hour, and at least `3600 / N`
//! seconds since its most recent play. The second gate spreads plays evenly
//! across the hour instead of letting them burst and then starve.
//!
//! The history is plain data so the timeline predictor can run the same
//! algorithm against a local, simulated copy.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Sliding-hour play history keyed by layout file.
#[derive(Debug, Clone, Default)]
pub struct PlayHistory {
    plays: HashMap<String, Vec<DateTime<Utc>>>,
}

impl PlayHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful play start.
    pub fn record_play(&mut self, layout: &str, now: DateTime<Utc>) {
        self.plays.entry(layout.to_string()).or_default().push(now);
        self.gc(now);
    }

    /// Drop entries older than one hour.
    pub fn gc(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(1);
        self.plays.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    /// Plays of a layout within the trailing hour.
    pub fn plays_in_last_hour(&self, layout: &str, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(1);
        self.plays
            .get(layout)
            .map(|times| times.iter().filter(|t| **t > cutoff).count())
            .unwrap_or(0)
    }

    /// Most recent play of a layout, if any survives GC.
    pub fn last_play(&self, layout: &str) -> Option<DateTime<Utc>> {
        self.plays.get(layout).and_then(|times| times.last().copied())
    }

    /// Whether a layout passes both rate-limit gates.
    ///
    /// `max_per_hour == 0` means unlimited.
    pub fn is_eligible(&self, layout: &str, max_per_hour: u32, now: DateTime<Utc>) -> bool {
        if max_per_hour == 0 {
            return true;
        }
        if self.plays_in_last_hour(layout, now) >= max_per_hour as usize {
            return false;
        }
        match self.last_play(layout) {
            None => true,
            Some(last) => {
                let min_gap = Duration::seconds((3600 / max_per_hour) as i64);
                now - last >= min_gap
            }
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.plays.clear();
    }

    /// Number of layouts with recorded plays.
    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}
