//! Criteria predicate evaluation
//!
//! Each scheduled layout may carry criteria of the form
//! `{metric, condition, type, value}`; all must pass for the layout to be
//! active. Metrics resolve from the current wall-clock time, the latest
//! weather snapshot, or the CMS-configured display property bag. An
//! unknown metric, or a numeric comparison over something that does not
//! parse, fails that predicate.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;

use crate::models::Criterion;

/// Everything a metric can resolve against.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricSources<'a> {
    /// Latest weather snapshot, loose JSON keyed by provider fields
    pub weather: Option<&'a serde_json::Value>,

    /// CMS-configured display properties
    pub display_properties: Option<&'a HashMap<String, String>>,
}

/// Evaluate all criteria; true when every predicate passes (AND).
pub fn all_pass(criteria: &[Criterion], now: DateTime<Utc>, sources: MetricSources<'_>) -> bool {
    criteria.iter().all(|c| evaluate(c, now, sources))
}

/// Evaluate a single predicate.
pub fn evaluate(criterion: &Criterion, now: DateTime<Utc>, sources: MetricSources<'_>) -> bool {
    let Some(actual) = resolve_metric(&criterion.metric, now, sources) else {
        tracing::debug!(metric = %criterion.metric, "unknown criteria metric");
        return false;
    };

    if criterion.value_type.eq_ignore_ascii_case("number") {
        let (Ok(lhs), Ok(rhs)) = (actual.parse::<f64>(), criterion.value.parse::<f64>()) else {
            return false;
        };
        compare_numeric(lhs, &criterion.condition, rhs)
    } else {
        compare_string(&actual, &criterion.condition, &criterion.value)
    }
}

fn resolve_metric(
    metric: &str,
    now: DateTime<Utc>,
    sources: MetricSources<'_>,
) -> Option<String> {
    match metric {
        // date/time metrics
        "dayOfWeek" => Some(weekday_name(now).to_string()),
        "dayOfMonth" => Some(now.day().to_string()),
        "month" => Some(now.month().to_string()),
        "hour" => Some(now.hour().to_string()),
        "isoDay" => Some(now.weekday().number_from_monday().to_string()),

        // weather metrics
        "weatherTemp" => weather_field(sources, "temp"),
        "weatherHumidity" => weather_field(sources, "humidity"),
        "weatherWindSpeed" => weather_field(sources, "windSpeed"),
        "weatherCondition" => weather_field(sources, "condition"),
        "weatherCloudCover" => weather_field(sources, "cloudCover"),

        // anything else is a display property
        other => sources
            .display_properties
            .and_then(|props| props.get(other))
            .cloned(),
    }
}

fn weekday_name(now: DateTime<Utc>) -> &'static str {
    match now.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}

fn weather_field(sources: MetricSources<'_>, key: &str) -> Option<String> {
    let value = sources.weather?.get(key)?;
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare_numeric(lhs: f64, condition: &str, rhs: f64) -> bool {
    match condition {
        "equals" => lhs == rhs,
        "notEquals" => lhs != rhs,
        "greaterThan" => lhs > rhs,
        "greaterThanOrEquals" => lhs >= rhs,
        "lessThan" => lhs < rhs,
        "lessThanOrEquals" => lhs <= rhs,
        // set/substring conditions degrade to string semantics
        _ => compare_string(&lhs.to_string(), condition, &rhs.to_string()),
    }
}

fn compare_string(actual: &str, condition: &str, expected: &str) -> bool {
    let lhs = actual.to_lowercase();
    let rhs = expected.to_lowercase();
    match condition {
        "equals" => lhs == rhs,
        "notEquals" => lhs != rhs,
        "greaterThan" => lhs > rhs,
        "greaterThanOrEquals" => lhs >= rhs,
        "lessThan" => lhs < rhs,
        "lessThanOrEquals" => lhs <= rhs,
        "contains" => lhs.contains(&rhs),
        "notContains" => !lhs.contains(&rhs),
        "startsWith" => lhs.starts_with(&rhs),
        "endsWith" => lhs.ends_with(&rhs),
        "in" => rhs.split(',').map(str::trim).any(|item| item == lhs),
        other => {
            tracing::debug!(condition = %other, "unknown criteria condition");
            false
        }
    }
}
