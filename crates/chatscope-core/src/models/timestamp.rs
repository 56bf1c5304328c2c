//! Timestamp parsing shared by the visualization and the search filters.
//!
//! Parse order: native formats (RFC 3339, RFC 2822, ISO-like naive datetimes)
//! → truncated / regional dates → numeric epoch in seconds or milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde_json::Value;

/// Numbers below this are epoch seconds, above it epoch milliseconds
pub const EPOCH_SECONDS_CUTOFF: f64 = 10_000_000_000.0;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%z"];

const TRUNCATED_DATETIME_FORMATS: &[&str] = &["%d.%m.%Y %H:%M:%S", "%d.%m.%Y %H:%M", "%Y/%m/%d %H:%M:%S"];

const TRUNCATED_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"];

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch_number),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    parse_native(s)
        .or_else(|| parse_truncated(s))
        .or_else(|| s.parse::<f64>().ok().and_then(from_epoch_number))
}

fn parse_native(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
}

fn parse_truncated(s: &str) -> Option<DateTime<Utc>> {
    if let Some(naive) = TRUNCATED_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
    {
        return Some(naive.and_utc());
    }
    TRUNCATED_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_epoch_number(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }
    let millis = if n.abs() < EPOCH_SECONDS_CUTOFF { n * 1000.0 } else { n };
    DateTime::from_timestamp_millis(millis.round() as i64)
}

/// Display form used in tooltips and the detail pane, e.g. `Mar 4, 2024 9:05 PM`.
pub fn format_timestamp(value: &Value) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%b %-d, %Y %-I:%M %p").to_string(),
        None => "Invalid date".to_string(),
    }
}

/// Position within the day in `[0, 1)`.
pub fn time_of_day_fraction(dt: &DateTime<Utc>) -> f64 {
    let seconds = dt.num_seconds_from_midnight() as f64;
    seconds / 86_400.0
}
