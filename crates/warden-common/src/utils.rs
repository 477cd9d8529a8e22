//! Shared utility functions.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Formats a timestamp for display.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Truncates a string to at most `max_chars` characters, appending an ellipsis when cut.
///
/// Counts characters rather than bytes so multi-byte message content never
/// splits inside a code point.
pub fn truncate_string(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let kept: String = input.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Renders a duration as a compact human string such as `1h 5m` or `2.5s`.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    if total_secs < 60 {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            return format!("{total_secs}s");
        }
        return format!("{:.1}s", duration.as_secs_f64());
    }

    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 && days == 0 {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(timestamp), "2024-01-01 12:00:00 UTC");
    }

    #[test]
    fn test_truncate_string() {
        let input = "This is a very long string that should be truncated";
        assert_eq!(truncate_string(input, 20), "This is a very lo...");
        assert_eq!(truncate_string("Short", 20), "Short");
    }

    #[test]
    fn test_truncate_string_multibyte() {
        let input = "ééééééééééé";
        let truncated = truncate_string(input, 5);
        assert_eq!(truncated, "éé...");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3)), "3s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3_900)), "1h 5m");
        assert_eq!(format_duration(Duration::from_secs(90_000)), "1d 1h");
    }
}
