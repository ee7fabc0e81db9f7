//! Timestamp parsing and formatting
//!
//! The reporting API is not consistent about timestamp shapes: most fields
//! are RFC 3339, some omit the offset, some carry only a date. Everything is
//! normalized to UTC on the way in and written back out in one fixed-width
//! format so that a textual `MAX()` in storage is also the chronological one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Format used for the `modifiedAtStartTime` / `modifiedAtEndTime` query bounds
const QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format used for every timestamp written to storage
const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Offset-less layouts the source has been seen to emit
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a source timestamp, assuming UTC when no offset is present
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format a timestamp for storage
pub fn format_storage(dt: &DateTime<Utc>) -> String {
    dt.format(STORAGE_FORMAT).to_string()
}

/// Format a timestamp as an API query bound
pub fn format_query(dt: &DateTime<Utc>) -> String {
    dt.format(QUERY_FORMAT).to_string()
}

/// Deserialize a required timestamp field
pub fn required<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {:?}", raw)))
}

/// Deserialize an optional timestamp field
///
/// `null`, a missing field (with `#[serde(default)]`) and an empty string
/// all become `None`. A non-empty string that does not parse is an error.
pub fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {:?}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp("2024-03-05T10:11:12.345Z").unwrap();
        assert_eq!(dt.timestamp_millis() % 1000, 345);

        let offset = parse_timestamp("2024-03-05T12:11:12+02:00").unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2024, 3, 5, 10, 11, 12).unwrap());
    }

    #[test]
    fn test_parse_without_offset_is_utc() {
        let dt = parse_timestamp("2024-03-05T10:11:12").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 5, 10, 11, 12).unwrap());

        let fractional = parse_timestamp("2024-03-05T10:11:12.5").unwrap();
        assert_eq!(fractional.timestamp_subsec_millis(), 500);

        let spaced = parse_timestamp("2024-03-05 10:11:12").unwrap();
        assert_eq!(spaced, dt);
    }

    #[test]
    fn test_parse_date_only() {
        let dt = parse_timestamp("2024-03-05").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_storage_format_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1);
        let c = a + chrono::Duration::seconds(1);

        let (fa, fb, fc) = (format_storage(&a), format_storage(&b), format_storage(&c));
        assert_eq!(fa.len(), fb.len());
        assert_eq!(fb.len(), fc.len());
        assert!(fa < fb && fb < fc);
        assert_eq!(parse_timestamp(&fb), Some(b));
    }

    #[test]
    fn test_query_format_truncates_subseconds() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 8, 6, 30, 0).unwrap() + chrono::Duration::milliseconds(750);
        assert_eq!(format_query(&dt), "2024-01-08T06:30:00");
    }

    #[test]
    fn test_optional_deserializer() {
        #[derive(serde::Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "optional")]
            at: Option<DateTime<Utc>>,
        }

        let missing: Probe = serde_json::from_str("{}").unwrap();
        assert!(missing.at.is_none());

        let null: Probe = serde_json::from_str(r#"{"at": null}"#).unwrap();
        assert!(null.at.is_none());

        let empty: Probe = serde_json::from_str(r#"{"at": ""}"#).unwrap();
        assert!(empty.at.is_none());

        let set: Probe = serde_json::from_str(r#"{"at": "2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(set.at.is_some());

        assert!(serde_json::from_str::<Probe>(r#"{"at": "soon"}"#).is_err());
    }
}
