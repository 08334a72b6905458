//! Layout blacklist tracking
//!
//! A layout that repeatedly fails to render must not put the display into
//! a render-crash hot loop. The tracker counts consecutive failures per
//! layout and blacklists after a threshold; a successful render clears the
//! entry, and any required-files manifest change resets the whole table.
//!
//! The tracker is pure state: the core reacts to [`FailureOutcome`] by
//! emitting events and firing the CMS report.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Failures before a layout is blacklisted.
pub const DEFAULT_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
struct Entry {
    failures: u32,
    blacklisted: bool,
    reason: String,
    first_failure: DateTime<Utc>,
}

/// What a failure report did to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Counter incremented, threshold not yet reached
    Counted { failures: u32 },
    /// This report crossed the threshold
    Blacklisted { failures: u32, reason: String },
    /// Already blacklisted; nothing new
    AlreadyBlacklisted,
}

/// Per-layout consecutive-failure tracker.
#[derive(Debug, Clone)]
pub struct BlacklistTracker {
    threshold: u32,
    entries: HashMap<String, Entry>,
}

impl Default for BlacklistTracker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl BlacklistTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            entries: HashMap::new(),
        }
    }

    /// Record a render failure.
    pub fn report_failure(
        &mut self,
        layout: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> FailureOutcome {
        let entry = self.entries.entry(layout.to_string()).or_insert(Entry {
            failures: 0,
            blacklisted: false,
            reason: String::new(),
            first_failure: now,
        });

        if entry.blacklisted {
            return FailureOutcome::AlreadyBlacklisted;
        }

        entry.failures += 1;
        entry.reason = reason.to_string();

        if entry.failures >= self.threshold {
            entry.blacklisted = true;
            FailureOutcome::Blacklisted {
                failures: entry.failures,
                reason: entry.reason.clone(),
            }
        } else {
            FailureOutcome::Counted {
                failures: entry.failures,
            }
        }
    }

    /// Record a successful render; returns true if the layout had been
    /// blacklisted (the core emits `LayoutUnblacklisted` in that case).
    pub fn report_success(&mut self, layout: &str) -> bool {
        self.entries
            .remove(layout)
            .map(|e| e.blacklisted)
            .unwrap_or(false)
    }

    pub fn is_blacklisted(&self, layout: &str) -> bool {
        self.entries
            .get(layout)
            .map(|e| e.blacklisted)
            .unwrap_or(false)
    }

    /// Clear all entries; called exactly when the required-files token
    /// changes (new content may fix what was broken).
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Currently blacklisted layout files.
    pub fn blacklisted(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.blacklisted)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Age of the oldest tracked failure, for fault reports.
    pub fn oldest_failure(&self) -> Option<DateTime<Utc>> {
        self.entries.values().map(|e| e.first_failure).min()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
