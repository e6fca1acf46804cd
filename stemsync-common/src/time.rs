//! Timestamp and unit helpers

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Convert a millisecond threshold to seconds
pub fn ms_to_secs(ms: f64) -> f64 {
    ms / 1000.0
}

/// Convert seconds to milliseconds (for logging drift values)
pub fn secs_to_ms(secs: f64) -> f64 {
    secs * 1000.0
}

/// Convert a whole number of days to a chrono duration
pub fn days(count: u32) -> chrono::Duration {
    chrono::Duration::days(i64::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
    }

    #[test]
    fn test_ms_secs_conversion() {
        assert_eq!(ms_to_secs(30.0), 0.03);
        assert_eq!(secs_to_ms(0.1), 100.0);
        assert_eq!(ms_to_secs(secs_to_ms(2.5)), 2.5);
    }

    #[test]
    fn test_days() {
        assert_eq!(days(14).num_hours(), 14 * 24);
    }
}
