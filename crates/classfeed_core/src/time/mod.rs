//! Clock helpers and relative-time presentation for feed consumers.

mod relative;

pub use relative::format_relative_time;

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
