//! Timestamp utilities
//!
//! Card Graph stores wall-clock local time as `YYYY-MM-DD HH:MM:SS` text so
//! that SQL range comparisons (`scheduled_start <= ?`) work lexically.

use chrono::{DateTime, Local, NaiveDateTime, Timelike};

/// Storage format for every timestamp column
pub const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time truncated to whole seconds
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Format a timestamp for storage
pub fn to_db(dt: &NaiveDateTime) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// `YYYYMMDD` stamp used in archive and segment file names
pub fn date_stamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%d").to_string()
}

/// Parse a user-supplied datetime
///
/// Accepts the storage format, HTML `datetime-local` values (with or without
/// seconds), a space-separated form without seconds, and RFC 3339 (converted
/// to local time). Returns `None` for anything else.
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    for format in [
        DB_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }

    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}

/// Seconds between two timestamps, never negative
pub fn elapsed_seconds(start: &NaiveDateTime, end: &NaiveDateTime) -> i64 {
    (*end - *start).num_seconds().max(0)
}
