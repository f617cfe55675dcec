//! Conversions between the epoch-millisecond sort keys the backend orders by and
//! the ISO-8601 strings its range queries accept.
//!
//! These conversions are total for every timestamp chrono can represent; values
//! outside that range clamp to the nearest representable instant.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds -> ISO-8601 with millisecond precision, e.g.
/// `2016-07-14T13:37:45.123Z`.
#[must_use]
pub fn millis_to_iso8601(millis: i64) -> String {
    let timestamp = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(if millis < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    });

    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 / RFC 3339 timestamp into epoch milliseconds.
#[must_use]
pub fn iso8601_to_millis(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|timestamp| timestamp.timestamp_millis())
}

/// Default index name for a given day, `logstash-YYYY.MM.DD`.
#[must_use]
pub fn daily_index_name(day: DateTime<Utc>) -> String {
    day.format("logstash-%Y.%m.%d").to_string()
}
