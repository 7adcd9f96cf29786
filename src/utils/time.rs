use chrono::{DateTime, Local, NaiveDateTime, SubsecRound, TimeZone};

/// Format used for the `timestamp` column of the activity log.
pub const SAMPLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used when showing when the current session started.
pub const SESSION_START_FORMAT: &str = "%H:%M %d/%m/%Y";

/// Renders whole seconds as `1d 2h 3m 4s`. Each unit is omitted when it's zero, apart from seconds
/// which are always shown.
pub fn format_elapsed_time(seconds: u64) -> String {
    let (days, remainder) = (seconds / 86_400, seconds % 86_400);
    let (hours, remainder) = (remainder / 3_600, remainder % 3_600);
    let (minutes, seconds) = (remainder / 60, remainder % 60);

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}

/// Converts a moment into local wall-clock time with second precision.
pub fn local_second<Tz: TimeZone>(moment: &DateTime<Tz>) -> NaiveDateTime {
    moment.with_timezone(&Local).naive_local().trunc_subsecs(0)
}
