/// Utility functions for timestamps and status formatting
use time::{format_description, OffsetDateTime};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Format a unix timestamp (seconds) the same way, or "-" if out of range
pub fn format_unix(timestamp: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(timestamp) {
        Ok(dt) => format_datetime(&dt),
        Err(_) => "-".to_string(),
    }
}

/// Current wall-clock time as whole unix seconds
///
/// Arrival timestamps and reading timestamps share this resolution.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_unix_timestamps() {
        assert_eq!(format_unix(0), "01.01.1970 - 00:00:00");
        assert_eq!(format_unix(1_700_000_000), "14.11.2023 - 22:13:20");
        assert_eq!(format_unix(i64::MAX), "-");
    }

    #[test]
    fn now_is_after_2023() {
        assert!(unix_now() > 1_700_000_000);
    }
}
