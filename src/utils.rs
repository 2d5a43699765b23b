//! Utility functions for timestamps, rounding and log formatting.
//!
//! This module provides helpers used throughout the application:
//! - RFC 3339 formatting and lenient parsing of store timestamps
//! - Hour bucketing for metrics
//! - Fixed-decimal rounding for durations and percentages
//! - Human-readable renderings for status messages

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Timelike, Utc};
use chrono_tz::Tz;

/// Format a UTC timestamp the way the store expects it.
///
/// Whole seconds, explicit `+00:00` offset: `2025-05-06T14:03:12+00:00`.
pub fn iso_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse a timestamp returned by the store.
///
/// Accepts RFC 3339 (`Z` or numeric offset) and naive ISO datetimes, which are
/// read as UTC. Returns `None` for anything else.
///
/// # Examples
///
/// ```ignore
/// assert!(parse_timestamp("2025-05-06T14:00:00Z").is_some());
/// assert!(parse_timestamp("2025-05-06T14:00:00.123456").is_some());
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Truncate a timestamp to the start of its hour.
pub fn hour_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Render elapsed minutes with at most two decimals and no trailing zeros.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_minutes(0.1), "0.1");
/// assert_eq!(format_minutes(2.0), "2");
/// assert_eq!(format_minutes(1.256), "1.26");
/// ```
pub fn format_minutes(minutes: f64) -> String {
    let s = format!("{:.2}", minutes);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Wall-clock rendering in `tz` as `("HH:MM", "DD.MM.YYYY")`.
///
/// # Arguments
///
/// * `ts` - The instant to render
/// * `tz` - The zone to render it in, e.g. `chrono_tz::Europe::Berlin`
///
/// # Examples
///
/// ```ignore
/// let ts = Utc.with_ymd_and_hms(2025, 5, 6, 14, 0, 0).unwrap();
/// assert_eq!(local_time_and_date(ts, Europe::Berlin), ("16:00".into(), "06.05.2025".into()));
/// ```
pub fn local_time_and_date(ts: DateTime<Utc>, tz: Tz) -> (String, String) {
    let local = ts.with_timezone(&tz);
    (
        local.format("%H:%M").to_string(),
        local.format("%d.%m.%Y").to_string(),
    )
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}
