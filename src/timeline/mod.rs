//! Playback timeline prediction
//!
//! Simulates the next few hours of playback offline: walk a clock across
//! the horizon, ask the evaluator which layouts are time-active at each
//! step, apply a local copy of the rate limiter, pick the highest
//! remaining priority, and round-robin until the active set changes at a
//! daypart boundary. Lower-priority layouts that were time-active but not
//! selected ride along as hidden entries for UI introspection.
//!
//! Durations come from the cached layout files via [`xlf`]; a renderer
//! can refine them at play time through [`LayoutDurations::record`].

pub mod xlf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Schedule;
use crate::schedule::evaluator::all_layouts_at;
use crate::schedule::ratelimit::PlayHistory;

pub use xlf::{parse_layout_duration, XlfError, PLACEHOLDER_DURATION_SECS};

/// Hard cap on predicted entries, whatever the horizon.
pub const MAX_TIMELINE_ENTRIES: usize = 500;

/// Step taken when nothing at all is playable and no default exists.
const IDLE_SKIP_SECS: i64 = 60;

// ============================================================================
// Duration ledger
// ============================================================================

/// Known playback durations per layout file.
#[derive(Debug, Clone, Default)]
pub struct LayoutDurations {
    durations: HashMap<String, u32>,
}

impl LayoutDurations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a duration from a parsed layout file.
    pub fn set(&mut self, file: &str, secs: u32) {
        self.durations.insert(file.to_string(), secs);
    }

    /// Correct a duration from an observed play.
    ///
    /// Placeholder-length entries may be corrected in either direction,
    /// but a previously observed duration beyond the placeholder never
    /// shrinks: a long layout reported short mid-play must not truncate
    /// future predictions.
    pub fn record(&mut self, file: &str, secs: u32) {
        if secs == 0 {
            return;
        }
        if let Some(current) = self.durations.get(file) {
            if *current > PLACEHOLDER_DURATION_SECS && secs < *current {
                return;
            }
        }
        self.durations.insert(file.to_string(), secs);
    }

    /// Duration to plan with; unknown or zero-length layouts get the
    /// placeholder.
    pub fn duration_of(&self, file: &str) -> u32 {
        match self.durations.get(file) {
            Some(secs) if *secs > 0 => *secs,
            _ => PLACEHOLDER_DURATION_SECS,
        }
    }
}

// ============================================================================
// Prediction
// ============================================================================

/// Options for a prediction run.
#[derive(Debug, Clone)]
pub struct TimelineOptions {
    /// Start of the horizon
    pub from: DateTime<Utc>,

    /// Horizon length in hours
    pub hours: u32,

    /// When the currently-playing layout started, to shorten the first
    /// entry to its remaining duration
    pub current_layout_started_at: Option<DateTime<Utc>>,
}

/// One predicted slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub layout_file: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: u32,
    pub is_default: bool,
    /// Time-active at this moment but outranked
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

/// Predict playback over the horizon.
pub fn predict(
    schedule: &Schedule,
    durations: &LayoutDurations,
    options: &TimelineOptions,
) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = Vec::new();
    let mut simulated = PlayHistory::new();

    let horizon_end = options.from + Duration::hours(options.hours as i64);
    let mut t = options.from;

    let mut rotation: usize = 0;
    let mut last_playable: Option<Vec<String>> = None;
    let mut first_entry = true;

    while t < horizon_end && entries.len() < MAX_TIMELINE_ENTRIES {
        let active = all_layouts_at(schedule, t);

        let eligible: Vec<_> = active
            .iter()
            .filter(|l| simulated.is_eligible(&l.file, l.max_plays_per_hour, t))
            .collect();

        if eligible.is_empty() {
            last_playable = None;
            match &schedule.default_layout {
                Some(default) => {
                    let duration = durations.duration_of(default);
                    let end = t + Duration::seconds(duration as i64);
                    entries.push(TimelineEntry {
                        layout_file: default.clone(),
                        start_time: t,
                        end_time: end,
                        duration_secs: duration,
                        is_default: true,
                        hidden: false,
                    });
                    first_entry = false;
                    t = end;
                }
                None => {
                    t += Duration::seconds(IDLE_SKIP_SECS);
                }
            }
            continue;
        }

        let top = eligible.iter().map(|l| l.priority).max().unwrap_or(0);
        let playable: Vec<String> = eligible
            .iter()
            .filter(|l| l.priority == top)
            .map(|l| l.file.clone())
            .collect();
        let outranked: Vec<String> = active
            .iter()
            .map(|l| l.file.clone())
            .filter(|f| !playable.contains(f))
            .collect();

        // the rotation cursor survives only while the playable set does;
        // a daypart boundary resets it
        if last_playable.as_ref() == Some(&playable) {
            rotation += 1;
        } else {
            rotation = 0;
            last_playable = Some(playable.clone());
        }

        let selected = playable[rotation % playable.len()].clone();
        let mut duration = durations.duration_of(&selected);

        if first_entry {
            if let Some(started_at) = options.current_layout_started_at {
                let elapsed = (options.from - started_at).num_seconds().max(0) as u32;
                duration = duration.saturating_sub(elapsed).max(1);
            }
            first_entry = false;
        }

        let end = t + Duration::seconds(duration as i64);
        entries.push(TimelineEntry {
            layout_file: selected.clone(),
            start_time: t,
            end_time: end,
            duration_secs: duration,
            is_default: false,
            hidden: false,
        });

        for file in outranked {
            if entries.len() >= MAX_TIMELINE_ENTRIES {
                break;
            }
            entries.push(TimelineEntry {
                layout_file: file,
                start_time: t,
                end_time: end,
                duration_secs: duration,
                is_default: false,
                hidden: true,
            });
        }

        simulated.record_play(&selected, t);
        t = end;
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlayRules, ScheduledLayout};

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn layout(file: &str, priority: u32) -> ScheduledLayout {
        ScheduledLayout {
            file: file.into(),
            rules: PlayRules {
                priority,
                fromdt: Some(at("2024-01-01T00:00:00Z")),
                todt: Some(at("2030-01-01T00:00:00Z")),
                ..Default::default()
            },
        }
    }

    fn options(hours: u32) -> TimelineOptions {
        TimelineOptions {
            from: at("2024-05-01T12:00:00Z"),
            hours,
            current_layout_started_at: None,
        }
    }

    #[test]
    fn test_round_robin_rotation() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("a.xlf", 5));
        sched.layouts.push(layout("b.xlf", 5));

        let mut durations = LayoutDurations::new();
        durations.set("a.xlf", 30);
        durations.set("b.xlf", 30);

        let entries = predict(&sched, &durations, &options(1));
        let visible: Vec<_> = entries
            .iter()
            .filter(|e| !e.hidden)
            .map(|e| e.layout_file.as_str())
            .collect();

        assert!(visible.len() >= 4);
        assert_eq!(&visible[..4], &["a.xlf", "b.xlf", "a.xlf", "b.xlf"]);
    }

    #[test]
    fn test_durations_are_contiguous() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("a.xlf", 5));
        let mut durations = LayoutDurations::new();
        durations.set("a.xlf", 45);

        let entries = predict(&sched, &durations, &options(1));
        let visible: Vec<_> = entries.iter().filter(|e| !e.hidden).collect();

        let total: i64 = visible.iter().map(|e| e.duration_secs as i64).sum();
        let span = (visible.last().unwrap().end_time - visible[0].start_time).num_seconds();
        assert_eq!(total, span);

        for pair in visible.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn test_rate_limited_layout_falls_back_to_lower_priority() {
        let mut sched = Schedule::default();
        let mut interrupt = layout("interrupt.xlf", 10);
        interrupt.rules.max_plays_per_hour = 1;
        sched.layouts.push(interrupt);
        sched.layouts.push(layout("filler.xlf", 1));

        let mut durations = LayoutDurations::new();
        durations.set("interrupt.xlf", 60);
        durations.set("filler.xlf", 60);

        let entries = predict(&sched, &durations, &options(1));
        let visible: Vec<_> = entries
            .iter()
            .filter(|e| !e.hidden)
            .map(|e| e.layout_file.as_str())
            .collect();

        // interrupt plays once, then the filler carries the hour
        assert_eq!(visible[0], "interrupt.xlf");
        assert!(visible[1..].iter().all(|f| *f == "filler.xlf"));
    }

    #[test]
    fn test_hidden_entries_for_outranked_layouts() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("top.xlf", 10));
        sched.layouts.push(layout("under.xlf", 1));

        let durations = LayoutDurations::new();
        let entries = predict(&sched, &durations, &options(1));

        let first_hidden = entries.iter().find(|e| e.hidden).unwrap();
        assert_eq!(first_hidden.layout_file, "under.xlf");
        assert_eq!(first_hidden.start_time, entries[0].start_time);
    }

    #[test]
    fn test_default_fills_gaps() {
        let mut sched = Schedule {
            default_layout: Some("default.xlf".into()),
            ..Default::default()
        };
        // active only in the second half-hour of the horizon
        let mut l = layout("later.xlf", 5);
        l.rules.fromdt = Some(at("2024-05-01T12:30:00Z"));
        sched.layouts.push(l);

        let mut durations = LayoutDurations::new();
        durations.set("default.xlf", 60);
        durations.set("later.xlf", 60);

        let entries = predict(&sched, &durations, &options(1));
        assert!(entries[0].is_default);
        assert_eq!(entries[0].layout_file, "default.xlf");
        assert!(entries.iter().any(|e| e.layout_file == "later.xlf"));
    }

    #[test]
    fn test_daypart_boundary_switches_layout() {
        let mut sched = Schedule::default();
        let mut morning = layout("morning.xlf", 5);
        morning.rules.todt = Some(at("2024-05-01T12:30:00Z"));
        sched.layouts.push(morning);
        let mut afternoon = layout("afternoon.xlf", 5);
        afternoon.rules.fromdt = Some(at("2024-05-01T12:30:00Z"));
        sched.layouts.push(afternoon);

        let mut durations = LayoutDurations::new();
        durations.set("morning.xlf", 600);
        durations.set("afternoon.xlf", 600);

        let entries = predict(&sched, &durations, &options(2));
        let visible: Vec<_> = entries
            .iter()
            .filter(|e| !e.hidden)
            .map(|e| e.layout_file.as_str())
            .collect();

        let boundary = visible.iter().position(|f| *f == "afternoon.xlf").unwrap();
        assert!(boundary >= 1);
        assert!(visible[..boundary].iter().all(|f| *f == "morning.xlf"));
        assert!(visible[boundary..].iter().all(|f| *f == "afternoon.xlf"));
    }

    #[test]
    fn test_first_entry_shortened_by_started_at() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("a.xlf", 5));
        let mut durations = LayoutDurations::new();
        durations.set("a.xlf", 100);

        let opts = TimelineOptions {
            from: at("2024-05-01T12:00:00Z"),
            hours: 1,
            current_layout_started_at: Some(at("2024-05-01T11:59:20Z")),
        };
        let entries = predict(&sched, &durations, &opts);
        assert_eq!(entries[0].duration_secs, 60);
        assert_eq!(entries[1].duration_secs, 100);
    }

    #[test]
    fn test_entry_cap() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("a.xlf", 5));
        let mut durations = LayoutDurations::new();
        durations.set("a.xlf", 1);

        let entries = predict(&sched, &durations, &options(10));
        assert_eq!(entries.len(), MAX_TIMELINE_ENTRIES);
    }

    #[test]
    fn test_empty_schedule_empty_timeline() {
        let entries = predict(&Schedule::default(), &LayoutDurations::new(), &options(2));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_duration_record_never_shrinks_long_layouts() {
        let mut durations = LayoutDurations::new();

        // placeholder may be corrected downward
        durations.set("short.xlf", PLACEHOLDER_DURATION_SECS);
        durations.record("short.xlf", 30);
        assert_eq!(durations.duration_of("short.xlf"), 30);

        // an observed long duration never shrinks
        durations.record("long.xlf", 300);
        durations.record("long.xlf", 120);
        assert_eq!(durations.duration_of("long.xlf"), 300);

        // but it may grow
        durations.record("long.xlf", 600);
        assert_eq!(durations.duration_of("long.xlf"), 600);

        // unknown layouts plan with the placeholder
        assert_eq!(
            durations.duration_of("unknown.xlf"),
            PLACEHOLDER_DURATION_SECS
        );
    }
}
