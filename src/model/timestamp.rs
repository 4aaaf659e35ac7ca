//! ISO8601 timestamp helpers.
//!
//! Timestamps are stored as text exactly as received, and parsed only when
//! they need to be compared (since-filter, skip decisions, validation).

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Current time as an RFC3339 string in UTC.
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an ISO8601 timestamp.
///
/// Accepts RFC3339 (`2024-05-01T10:00:00Z`, offsets), naive datetimes
/// (`2024-05-01T10:00:00`, `2024-05-01 10:00:00.123`, read as UTC) and bare
/// dates (`2024-05-01`, midnight UTC). Returns `None` for blank or
/// unparseable input.
#[must_use]
pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse an optional timestamp field.
#[must_use]
pub fn parse_opt(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(parse_iso)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let a = parse_iso("2024-05-01T12:00:00+02:00").unwrap();
        let b = parse_iso("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_naive_and_date() {
        assert!(parse_iso("2024-05-01T10:00:00").is_some());
        assert!(parse_iso("2024-05-01 10:00:00.250").is_some());
        let date = parse_iso("2024-05-01").unwrap();
        assert_eq!(date, parse_iso("2024-05-01T00:00:00Z").unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_iso("").is_none());
        assert!(parse_iso("   ").is_none());
        assert!(parse_iso("yesterday").is_none());
        assert!(parse_opt(None).is_none());
    }

    #[test]
    fn test_now_iso_round_trips() {
        assert!(parse_iso(&now_iso()).is_some());
    }
}
