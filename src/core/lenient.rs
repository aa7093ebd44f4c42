//! Forgiving deserializers for server payloads.
//! Nulls and unparseable values become defaults instead of decode errors.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `null` or a value of the wrong shape -> `T::default()`
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(T::deserialize(raw).unwrap_or_else(|e| {
        tracing::debug!("Defaulting malformed field: {}", e);
        T::default()
    }))
}

/// Dates sent as `YYYY-MM-DD` or any ISO-8601 datetime
pub fn date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_date))
}

/// RFC 3339 timestamps; zone-less timestamps are taken as UTC
pub fn datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_datetime))
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    parse_date(s)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 14);
        assert_eq!(parse_date("2026-03-14"), expected);
        assert_eq!(parse_date("2026-03-14T10:00:00Z"), expected);
        assert_eq!(parse_date("2026-03-14T10:00:00.123456"), expected);
        assert_eq!(parse_date("14/03/2026"), None);
        assert_eq!(parse_date(""), None);
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Row {
        #[serde(deserialize_with = "or_default")]
        count: u64,
        #[serde(deserialize_with = "or_default")]
        label: String,
    }

    #[test]
    fn test_or_default_absorbs_null_and_wrong_types() {
        let row: Row = serde_json::from_str(r#"{"count":null,"label":42}"#).unwrap();
        assert_eq!(row.count, 0);
        assert_eq!(row.label, "");

        let row: Row = serde_json::from_str(r#"{"count":"many"}"#).unwrap();
        assert_eq!(row.count, 0);

        let row: Row = serde_json::from_str(r#"{"count":7,"label":"ok"}"#).unwrap();
        assert_eq!((row.count, row.label.as_str()), (7, "ok"));
    }

    #[test]
    fn test_parse_datetime_without_zone() {
        let dt = parse_datetime("2026-03-14T10:30:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-14T10:30:00+00:00");
    }
}
