//! ISO-8601 timestamps with millisecond resolution.
//!
//! Every encoding writes `2024-01-02T03:04:05.678Z`; parsing is lenient and
//! accepts any RFC 3339 timestamp, or a zone-less timestamp read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::ProductError;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp the way products are serialized.
pub fn format_date(time: &DateTime<Utc>) -> String {
    time.format(DATE_FORMAT).to_string()
}

/// Parse a serialized timestamp, truncated to milliseconds.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, ProductError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(truncate_to_millis(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| truncate_to_millis(naive.and_utc()))
        .map_err(|_| ProductError::InvalidTimestamp(value.to_string()))
}

/// Drop sub-millisecond precision.
pub fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

/// Build a timestamp from epoch milliseconds.
pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, ProductError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ProductError::InvalidTimestamp(millis.to_string()))
}

/// Current time at millisecond resolution.
pub fn now_millis() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_has_millis_and_zulu() {
        let time = from_millis(1_700_000_000_123).unwrap();
        assert_eq!(format_date(&time), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_parse_accepts_offsets_and_missing_zone() {
        let utc = parse_date("2023-11-14T22:13:20.123Z").unwrap();
        let offset = parse_date("2023-11-14T23:13:20.123+01:00").unwrap();
        let naive = parse_date("2023-11-14T22:13:20.123").unwrap();
        assert_eq!(utc, offset);
        assert_eq!(utc, naive);
        assert_eq!(utc.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_parse_truncates_micros() {
        let parsed = parse_date("2023-11-14T22:13:20.123999Z").unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(parsed.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_date("yesterday"),
            Err(ProductError::InvalidTimestamp(_))
        ));
    }
}
