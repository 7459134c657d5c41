//! Timestamp helpers shared by step timing, file naming and error reports.

use chrono::{DateTime, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// The format is `YYYY-MM-DDTHH:MM:SS.mmmZ`, the shape record-store columns
/// and user-facing error reports expect.
///
/// # Examples
///
/// ```
/// use visitorflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with('Z'));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso8601(&Utc::now())
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as ISO 8601 string with millisecond precision.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Returns an ISO timestamp safe for use inside file names.
///
/// Colons and dots are replaced with dashes.
#[must_use]
pub fn file_safe_timestamp(dt: &Timestamp) -> String {
    format_iso8601(dt).replace([':', '.'], "-")
}

/// Milliseconds elapsed between two timestamps, clamped at zero.
#[must_use]
pub fn elapsed_ms(start: &Timestamp, end: &Timestamp) -> u64 {
    u64::try_from((*end - *start).num_milliseconds()).unwrap_or(0)
}

/// Encodes a number in lowercase base 36.
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// Time-based identifier used to correlate an error report with logs.
#[must_use]
pub fn time_based_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    to_base36(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn test_format_iso8601_millis() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_iso8601(&dt), "2024-03-09T14:05:07.000Z");
    }

    #[test]
    fn test_file_safe_timestamp() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(file_safe_timestamp(&dt), "2024-03-09T14-05-07-000Z");
    }

    #[test]
    fn test_elapsed_ms_clamps_negative() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(elapsed_ms(&b, &a), 1000);
        assert_eq!(elapsed_ms(&a, &b), 0);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_296), "100");
    }

    #[test]
    fn test_time_based_id_is_base36() {
        let id = time_based_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
