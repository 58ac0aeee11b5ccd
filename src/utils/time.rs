use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// This is the standard way of converting a date to a string in sitetime. The format sorts
/// lexicographically in calendar order.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Resolves an IANA timezone identifier. Unknown identifiers fall back to UTC, since a broken
/// setting must not stop the accounting.
pub fn resolve_timezone(timezone: &str) -> Tz {
    timezone.parse::<Tz>().unwrap_or_else(|e| {
        warn!("Unknown timezone {timezone:?}, using UTC: {e}");
        Tz::UTC
    })
}

/// Calendar date of `now` in `timezone`. Must be recomputed on every access, the date can change
/// while the process keeps running.
pub fn today(timezone: &str, now: DateTime<Utc>) -> String {
    date_key(now.with_timezone(&resolve_timezone(timezone)).date_naive())
}

/// Formats milliseconds the way display surfaces show them: `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(millis: u64) -> String {
    let total_seconds = millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
