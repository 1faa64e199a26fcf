//! Timestamp parsing and formatting
//!
//! Warehouse timestamps arrive in several textual shapes: RFC 3339 from the
//! Databricks statement API, `YYYY-MM-DD HH:MM:SS` from SQLite, occasionally
//! without fractional seconds or offset. Naive values are taken as UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a warehouse timestamp, returning `None` for anything unrecognised
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way it is bound into warehouse statements
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("2024-03-05T18:30:00.000Z").unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.hour(), 18);
    }

    #[test]
    fn test_parse_offset_is_normalised_to_utc() {
        let ts = parse_timestamp("2024-03-05T18:30:00-05:00").unwrap();
        assert_eq!(ts.hour(), 23);
    }

    #[test]
    fn test_parse_sqlite_shape() {
        let ts = parse_timestamp("2024-03-05 18:30:00").unwrap();
        assert_eq!(ts.minute(), 30);
        assert!(parse_timestamp("2024-03-05 18:30:00.250").is_some());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_format_round_trips() {
        let ts = parse_timestamp("2024-03-05T18:30:00Z").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-05T18:30:00.000Z");
    }
}
