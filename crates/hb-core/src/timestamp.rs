//! Timestamp parsing and formatting shared by every crate.
//!
//! Timestamps are persisted as RFC 3339 text with millisecond precision and a
//! `Z` suffix (e.g. `2025-01-15T10:30:00.000Z`), so lexicographic ordering in
//! SQL matches chronological ordering.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Largest magnitude of epoch seconds we attempt to convert.
const MAX_EPOCH_SECONDS: f64 = 1.0e12;

/// Formats a timestamp the way it is stored.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp, or a naive SQL-style `YYYY-MM-DD HH:MM:SS[.fff]`
/// timestamp which is interpreted as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Converts fractional epoch seconds into a UTC timestamp.
///
/// Returns `None` for non-finite or absurdly large values.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "range is checked before casting"
)]
pub fn epoch_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds.abs() > MAX_EPOCH_SECONDS {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Converts a UTC timestamp into fractional epoch seconds.
#[expect(
    clippy::cast_precision_loss,
    reason = "millisecond precision is sufficient for window bounds"
)]
pub fn datetime_to_epoch(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp_millis() as f64 / 1000.0
}
