//! Human-readable time formatting
//!
//! Provides consistent duration display for queue listings and log lines.

use std::time::Duration;

/// Label used when a track length is not known up front
pub const UNKNOWN_DURATION: &str = "unknown";

const SECONDS_PER_HOUR: u64 = 3600;

/// Format a track length for display in a queue listing.
///
/// - Under one hour: `M:SS`
/// - One hour or longer: `H:MM:SS`
///
/// # Examples
///
/// ```
/// use goro_common::human_time::duration_label;
///
/// assert_eq!(duration_label(5), "0:05");
/// assert_eq!(duration_label(212), "3:32");
/// assert_eq!(duration_label(3661), "1:01:01");
/// ```
pub fn duration_label(seconds: u64) -> String {
    let hours = seconds / SECONDS_PER_HOUR;
    let mins = (seconds % SECONDS_PER_HOUR) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Format a wait interval the way operators read it in logs.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use goro_common::human_time::describe_wait;
///
/// assert_eq!(describe_wait(Duration::from_secs(61)), "1 minute and 1 second");
/// assert_eq!(describe_wait(Duration::from_millis(150_500)), "2 minutes and 30 seconds");
/// ```
pub fn describe_wait(wait: Duration) -> String {
    let total = wait.as_secs();
    let minutes = total / 60;
    let seconds = total % 60;

    format!(
        "{} minute{} and {} second{}",
        minutes,
        if minutes == 1 { "" } else { "s" },
        seconds,
        if seconds == 1 { "" } else { "s" },
    )
}
