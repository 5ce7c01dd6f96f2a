use chrono::{DateTime, Local, TimeZone};
use std::fmt::Write;

/// Fallback used when a configured format string cannot be rendered.
const FALLBACK_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format a unix-millisecond timestamp as `"<date> <time>"` in local time.
///
/// Invalid format strings fall back to `%Y-%m-%d %H:%M` instead of
/// panicking; out-of-range timestamps yield an empty string.
pub fn format_timestamp(millis: i64, date_format: &str, time_format: &str) -> String {
    let Some(dt) = Local.timestamp_millis_opt(millis).single() else {
        return String::new();
    };

    let mut out = String::new();
    if write!(out, "{} {}", dt.format(date_format), dt.format(time_format)).is_err() {
        tracing::warn!(date_format, time_format, "Invalid date/time format, using fallback");
        return format_fallback(&dt);
    }
    out
}

fn format_fallback(dt: &DateTime<Local>) -> String {
    dt.format(FALLBACK_FORMAT).to_string()
}
