//! The schedule predicate engine
//!
//! Pure functions from `(schedule, now, context)` to the ordered set of
//! layouts that should be playing. Two variants exist:
//!
//! - [`layouts_now`] honors rate limits; it drives live playback.
//! - [`all_layouts_at`] ignores rate limits and non-time predicates; the
//!   timeline predictor uses it and simulates the rate limiter itself.
//!
//! Activity is the conjunction of the time window (with weekly dayparting
//! wrapping across midnight), the weekday mask, the recurrence range,
//! every criteria predicate, and the geo fence. Priorities partition the
//! active set: only the highest active priority plays, but the maximum is
//! tracked *before* rate-limit filtering so interrupt accounting sees the
//! true ceiling.

use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;

use crate::models::{PlayRules, RecurrenceType, Schedule};
use crate::schedule::criteria::{self, MetricSources};
use crate::schedule::geo::GeoFence;
use crate::schedule::ratelimit::PlayHistory;

/// Ambient state the evaluator consults.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    /// Player coordinates, if the platform reported them
    pub player_location: Option<(f64, f64)>,

    /// CMS-configured display properties
    pub display_properties: Option<&'a HashMap<String, String>>,

    /// Latest weather snapshot
    pub weather: Option<&'a serde_json::Value>,
}

/// A layout admitted by the evaluator, with the metadata the selector and
/// predictor need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    pub file: String,
    pub priority: u32,
    pub sync_event: bool,
    pub share_of_voice: u32,
    pub max_plays_per_hour: u32,
    /// Campaign the layout came from, if any
    pub campaign: Option<String>,
}

impl ResolvedLayout {
    fn from_rules(file: &str, rules: &PlayRules, campaign: Option<&str>) -> Self {
        Self {
            file: file.to_string(),
            priority: rules.priority,
            sync_event: rules.sync_event,
            share_of_voice: rules.share_of_voice,
            max_plays_per_hour: rules.max_plays_per_hour,
            campaign: campaign.map(str::to_string),
        }
    }
}

/// Result of [`layouts_now`].
#[derive(Debug, Clone, Default)]
pub struct LayoutsNow {
    /// Layouts to rotate through, highest active priority only
    pub layouts: Vec<ResolvedLayout>,

    /// Highest priority among *all* active candidates, measured before
    /// rate-limit filtering
    pub max_active_priority: Option<u32>,

    /// True when the result is the schedule default standing in for an
    /// empty filtered set
    pub is_default: bool,
}

impl LayoutsNow {
    /// Layout files in play order.
    pub fn files(&self) -> Vec<String> {
        self.layouts.iter().map(|l| l.file.clone()).collect()
    }
}

/// Layouts that should play at `now`, honoring rate limits.
pub fn layouts_now(
    schedule: &Schedule,
    now: DateTime<Utc>,
    ctx: EvalContext<'_>,
    history: &PlayHistory,
) -> LayoutsNow {
    let candidates = active_candidates(schedule, now, ctx);

    let max_active_priority = candidates.iter().map(|l| l.priority).max();

    let eligible: Vec<ResolvedLayout> = candidates
        .into_iter()
        .filter(|l| history.is_eligible(&l.file, l.max_plays_per_hour, now))
        .collect();

    if eligible.is_empty() {
        return match &schedule.default_layout {
            Some(default) => LayoutsNow {
                layouts: vec![ResolvedLayout {
                    file: default.clone(),
                    priority: 0,
                    sync_event: false,
                    share_of_voice: 0,
                    max_plays_per_hour: 0,
                    campaign: None,
                }],
                max_active_priority,
                is_default: true,
            },
            None => LayoutsNow {
                layouts: Vec::new(),
                max_active_priority,
                is_default: false,
            },
        };
    }

    let top = eligible.iter().map(|l| l.priority).max().unwrap_or(0);
    let layouts = eligible.into_iter().filter(|l| l.priority == top).collect();

    LayoutsNow {
        layouts,
        max_active_priority,
        is_default: false,
    }
}

/// Every *time-active* layout at `t` with its priority, ignoring rate
/// limits, criteria, and geo fencing. Campaign order is preserved.
pub fn all_layouts_at(schedule: &Schedule, t: DateTime<Utc>) -> Vec<ResolvedLayout> {
    let mut out = Vec::new();
    for campaign in &schedule.campaigns {
        if is_time_active(&campaign.rules, t) {
            for file in &campaign.layouts {
                out.push(ResolvedLayout::from_rules(
                    file,
                    &campaign.rules,
                    Some(&campaign.id),
                ));
            }
        }
    }
    for layout in &schedule.layouts {
        if is_time_active(&layout.rules, t) {
            out.push(ResolvedLayout::from_rules(&layout.file, &layout.rules, None));
        }
    }
    out
}

/// Fully-active candidates (time + criteria + geo), campaigns first.
fn active_candidates(
    schedule: &Schedule,
    now: DateTime<Utc>,
    ctx: EvalContext<'_>,
) -> Vec<ResolvedLayout> {
    let mut out = Vec::new();
    for campaign in &schedule.campaigns {
        if is_active(&campaign.rules, now, ctx) {
            for file in &campaign.layouts {
                out.push(ResolvedLayout::from_rules(
                    file,
                    &campaign.rules,
                    Some(&campaign.id),
                ));
            }
        }
    }
    for layout in &schedule.layouts {
        if is_active(&layout.rules, now, ctx) {
            out.push(ResolvedLayout::from_rules(&layout.file, &layout.rules, None));
        }
    }
    out
}

fn is_active(rules: &PlayRules, now: DateTime<Utc>, ctx: EvalContext<'_>) -> bool {
    if !is_time_active(rules, now) {
        return false;
    }

    let sources = MetricSources {
        weather: ctx.weather,
        display_properties: ctx.display_properties,
    };
    if !criteria::all_pass(&rules.criteria, now, sources) {
        return false;
    }

    if rules.is_geo_aware {
        if let Some(fence) = rules.geo_location.as_deref().and_then(GeoFence::parse) {
            // unknown player location is permissive
            if let Some((lat, lng)) = ctx.player_location {
                if !fence.contains(lat, lng) {
                    return false;
                }
            }
        }
    }

    true
}

/// Time-window activity: plain inclusive bounds, or for weekly recurrence
/// a time-of-day window (wrapping across midnight) on the selected days,
/// bounded by the recurrence range.
fn is_time_active(rules: &PlayRules, now: DateTime<Utc>) -> bool {
    if let Some(range_end) = rules.recurrence_range {
        if now > range_end {
            return false;
        }
    }

    let repeat_days = rules.repeat_days();
    if !repeat_days.is_empty() && !repeat_days.contains(&now.weekday().number_from_monday()) {
        return false;
    }

    match rules.recurrence_type {
        Some(RecurrenceType::Week) => in_daily_window(rules, now),
        _ => {
            if let Some(from) = rules.fromdt {
                if now < from {
                    return false;
                }
            }
            if let Some(to) = rules.todt {
                if now > to {
                    return false;
                }
            }
            true
        }
    }
}

/// Weekly dayparting compares times of day only; a window whose end
/// precedes its start wraps past midnight.
fn in_daily_window(rules: &PlayRules, now: DateTime<Utc>) -> bool {
    let (Some(from), Some(to)) = (rules.fromdt, rules.todt) else {
        // one-sided windows recur all day
        return true;
    };
    let t = now.time();
    let from_t = from.time();
    let to_t = to.time();
    if from_t <= to_t {
        t >= from_t && t <= to_t
    } else {
        t >= from_t || t <= to_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Campaign, Criterion, ScheduledLayout};

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

    #[test]
    fn test_window_bounds_inclusive() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("100.xlf", 0));

        let history = PlayHistory::new();
        let ctx = EvalContext::default();

        // inside
        let got = layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history);
        assert_eq!(got.files(), vec!["100.xlf"]);

        // exactly at fromdt
        let got = layouts_now(&sched, at("2024-01-01T00:00:00Z"), ctx, &history);
        assert_eq!(got.files(), vec!["100.xlf"]);

        // before fromdt
        let got = layouts_now(&sched, at("2023-12-31T23:59:59Z"), ctx, &history);
        assert!(got.layouts.is_empty());
    }

    #[test]
    fn test_priority_partitioning() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("low.xlf", 1));
        sched.layouts.push(layout("high-a.xlf", 10));
        sched.layouts.push(layout("high-b.xlf", 10));

        let history = PlayHistory::new();
        let got = layouts_now(&sched, at("2024-05-01T12:00:00Z"), EvalContext::default(), &history);

        assert_eq!(got.files(), vec!["high-a.xlf", "high-b.xlf"]);
        assert_eq!(got.max_active_priority, Some(10));
        assert!(!got.is_default);
    }

    #[test]
    fn test_campaigns_precede_standalone_at_same_priority() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("solo.xlf", 5));
        sched.campaigns.push(Campaign {
            id: "c1".into(),
            layouts: vec!["camp-1.xlf".into(), "camp-2.xlf".into()],
            rules: PlayRules {
                priority: 5,
                fromdt: Some(at("2024-01-01T00:00:00Z")),
                todt: Some(at("2030-01-01T00:00:00Z")),
                ..Default::default()
            },
        });

        let history = PlayHistory::new();
        let got = layouts_now(&sched, at("2024-05-01T12:00:00Z"), EvalContext::default(), &history);
        assert_eq!(got.files(), vec!["camp-1.xlf", "camp-2.xlf", "solo.xlf"]);
        assert_eq!(got.layouts[0].campaign.as_deref(), Some("c1"));
    }

    #[test]
    fn test_default_when_filtered_empty() {
        let mut sched = Schedule {
            default_layout: Some("0.xlf".into()),
            ..Default::default()
        };
        let mut limited = layout("100.xlf", 10);
        limited.rules.max_plays_per_hour = 3;
        sched.layouts.push(limited);

        let mut history = PlayHistory::new();
        let now = at("2024-05-01T12:00:00Z");
        history.record_play("100.xlf", now);

        // 10 minutes later the gap gate blocks the only layout
        let got = layouts_now(
            &sched,
            now + chrono::Duration::minutes(10),
            EvalContext::default(),
            &history,
        );
        assert!(got.is_default);
        assert_eq!(got.files(), vec!["0.xlf"]);
        // the rate-limited layout still counts toward the active ceiling
        assert_eq!(got.max_active_priority, Some(10));
    }

    #[test]
    fn test_no_default_yields_empty() {
        let sched = Schedule::default();
        let history = PlayHistory::new();
        let got = layouts_now(&sched, at("2024-05-01T12:00:00Z"), EvalContext::default(), &history);
        assert!(got.layouts.is_empty());
        assert!(!got.is_default);
        assert_eq!(got.max_active_priority, None);
    }

    #[test]
    fn test_weekly_recurrence_day_mask() {
        let mut sched = Schedule::default();
        let mut l = layout("weekday.xlf", 0);
        l.rules.recurrence_type = Some(RecurrenceType::Week);
        l.rules.recurrence_repeats_on = Some("1,2,3,4,5".into());
        sched.layouts.push(l);

        let history = PlayHistory::new();
        let ctx = EvalContext::default();

        // Wednesday
        let got = layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history);
        assert_eq!(got.files(), vec!["weekday.xlf"]);

        // Saturday
        let got = layouts_now(&sched, at("2024-05-04T12:00:00Z"), ctx, &history);
        assert!(got.layouts.is_empty());
    }

    #[test]
    fn test_weekly_recurrence_time_of_day_wraps_midnight() {
        let mut sched = Schedule::default();
        let mut l = ScheduledLayout {
            file: "night.xlf".into(),
            ..Default::default()
        };
        l.rules.recurrence_type = Some(RecurrenceType::Week);
        // 22:00 one day to 06:00 the next; the calendar dates are ignored
        l.rules.fromdt = Some(at("2024-01-01T22:00:00Z"));
        l.rules.todt = Some(at("2024-01-02T06:00:00Z"));
        sched.layouts.push(l);

        let history = PlayHistory::new();
        let ctx = EvalContext::default();

        assert!(!layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history)
            .files()
            .contains(&"night.xlf".to_string()));
        assert!(layouts_now(&sched, at("2024-05-01T23:00:00Z"), ctx, &history)
            .files()
            .contains(&"night.xlf".to_string()));
        assert!(layouts_now(&sched, at("2024-05-01T03:00:00Z"), ctx, &history)
            .files()
            .contains(&"night.xlf".to_string()));
    }

    #[test]
    fn test_recurrence_range_upper_bound() {
        let mut sched = Schedule::default();
        let mut l = layout("bounded.xlf", 0);
        l.rules.recurrence_type = Some(RecurrenceType::Week);
        l.rules.recurrence_range = Some(at("2024-06-01T00:00:00Z"));
        sched.layouts.push(l);

        let history = PlayHistory::new();
        let ctx = EvalContext::default();

        assert!(!layouts_now(&sched, at("2024-07-01T12:00:00Z"), ctx, &history)
            .files()
            .contains(&"bounded.xlf".to_string()));
        assert!(layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history)
            .files()
            .contains(&"bounded.xlf".to_string()));
    }

    #[test]
    fn test_criteria_gate() {
        let mut sched = Schedule::default();
        let mut l = layout("hot.xlf", 0);
        l.rules.criteria.push(Criterion {
            metric: "weatherTemp".into(),
            condition: "greaterThan".into(),
            value_type: "number".into(),
            value: "25".into(),
        });
        sched.layouts.push(l);

        let history = PlayHistory::new();
        let warm = serde_json::json!({"temp": 30});
        let cold = serde_json::json!({"temp": 10});

        let ctx = EvalContext {
            weather: Some(&warm),
            ..Default::default()
        };
        assert_eq!(
            layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history).files(),
            vec!["hot.xlf"]
        );

        let ctx = EvalContext {
            weather: Some(&cold),
            ..Default::default()
        };
        assert!(layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history)
            .layouts
            .is_empty());

        // no weather at all: numeric predicate cannot resolve, layout inactive
        let ctx = EvalContext::default();
        assert!(layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history)
            .layouts
            .is_empty());
    }

    #[test]
    fn test_geo_fence_permissive_without_location() {
        let mut sched = Schedule::default();
        let mut l = layout("near.xlf", 0);
        l.rules.is_geo_aware = true;
        l.rules.geo_location = Some("51.5074,-0.1278,500".into());
        sched.layouts.push(l);

        let history = PlayHistory::new();

        // no location: admit
        let got = layouts_now(
            &sched,
            at("2024-05-01T12:00:00Z"),
            EvalContext::default(),
            &history,
        );
        assert_eq!(got.files(), vec!["near.xlf"]);

        // inside the fence
        let ctx = EvalContext {
            player_location: Some((51.5074, -0.1278)),
            ..Default::default()
        };
        assert_eq!(
            layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history).files(),
            vec!["near.xlf"]
        );

        // far away
        let ctx = EvalContext {
            player_location: Some((48.8566, 2.3522)),
            ..Default::default()
        };
        assert!(layouts_now(&sched, at("2024-05-01T12:00:00Z"), ctx, &history)
            .layouts
            .is_empty());
    }

    #[test]
    fn test_all_layouts_at_ignores_rate_limit_and_criteria() {
        let mut sched = Schedule::default();
        let mut limited = layout("limited.xlf", 10);
        limited.rules.max_plays_per_hour = 1;
        let mut conditional = layout("conditional.xlf", 5);
        conditional.rules.criteria.push(Criterion {
            metric: "weatherTemp".into(),
            condition: "greaterThan".into(),
            value_type: "number".into(),
            value: "25".into(),
        });
        sched.layouts.push(limited);
        sched.layouts.push(conditional);

        let got = all_layouts_at(&sched, at("2024-05-01T12:00:00Z"));
        let files: Vec<_> = got.iter().map(|l| l.file.as_str()).collect();
        assert_eq!(files, vec!["limited.xlf", "conditional.xlf"]);
        assert_eq!(got[0].priority, 10);
    }

    #[test]
    fn test_evaluation_is_stable() {
        let mut sched = Schedule::default();
        sched.layouts.push(layout("a.xlf", 3));
        sched.layouts.push(layout("b.xlf", 3));

        let history = PlayHistory::new();
        let first = layouts_now(&sched, at("2024-05-01T12:00:00Z"), EvalContext::default(), &history);
        let second = layouts_now(&sched, at("2024-05-01T12:00:00Z"), EvalContext::default(), &history);
        assert_eq!(first.files(), second.files());
    }
}
