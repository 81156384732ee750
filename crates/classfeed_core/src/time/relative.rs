//! "Time ago" labels for notification timestamps.
//!
//! # Invariants
//! - Units are truncated, never rounded (90 s is "1 minutes ago").
//! - The label is a pure function of `created_at_ms` and `now_ms`.
//! - Timestamps in the future (clock skew) read as zero elapsed time.

use chrono::DateTime;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const ABSOLUTE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats a creation timestamp relative to `now_ms`.
///
/// - under one hour: `"{minutes} minutes ago"`
/// - under one day: `"{hours} hours ago"`
/// - one to two days: `"Yesterday"`
/// - two to seven days: `"{days} days ago"`
/// - seven days or more: UTC calendar date, `YYYY-MM-DD`
pub fn format_relative_time(created_at_ms: i64, now_ms: i64) -> String {
    let elapsed_ms = now_ms.saturating_sub(created_at_ms).max(0);
    let days = elapsed_ms / DAY_MS;

    match days {
        0 if elapsed_ms < HOUR_MS => format!("{} minutes ago", elapsed_ms / MINUTE_MS),
        0 => format!("{} hours ago", elapsed_ms / HOUR_MS),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days} days ago"),
        _ => absolute_date(created_at_ms),
    }
}

fn absolute_date(created_at_ms: i64) -> String {
    DateTime::from_timestamp_millis(created_at_ms).map_or_else(
        || created_at_ms.to_string(),
        |datetime| datetime.format(ABSOLUTE_DATE_FORMAT).to_string(),
    )
}
