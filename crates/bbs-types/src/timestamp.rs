//! Timestamp helpers and the serde format used in every on-disk document.
//!
//! Timestamps are written as naive ISO-8601 UTC with microsecond precision
//! (`2024-05-01T12:30:00.123456`). A zero fraction is omitted
//! (`2024-05-01T12:30:00`). Readers also accept RFC 3339 values carrying an
//! offset.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const WHOLE_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Current time truncated to the precision that survives a round-trip
/// through [`format`] and [`parse`].
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Render a timestamp in the on-disk format.
pub fn format(ts: &DateTime<Utc>) -> String {
    let naive = ts.naive_utc();
    if naive.nanosecond() / 1_000 == 0 {
        naive.format(WHOLE_SECONDS_FORMAT).to_string()
    } else {
        naive.format(WRITE_FORMAT).to_string()
    }
}

/// Parse a timestamp written by [`format`] or any RFC 3339 producer.
pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    let naive: NaiveDateTime = raw.parse()?;
    Ok(Utc.from_utc_datetime(&naive))
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

/// Same format for nullable fields such as `deleted_at`.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_some(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => super::parse(raw).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uses_microseconds_without_offset() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap() + chrono::Duration::microseconds(42);
        assert_eq!(format(&ts), "2024-05-01T12:30:00.000042");
    }

    #[test]
    fn whole_seconds_omit_the_fraction() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(format(&ts), "2024-05-01T12:30:00");
        assert_eq!(parse(&format(&ts)).unwrap(), ts);
    }

    #[test]
    fn parse_accepts_naive_and_offset_forms() {
        let naive = parse("2024-05-01T12:30:00.123456").unwrap();
        assert_eq!(naive.nanosecond(), 123_456_000);

        let bare = parse("2024-05-01T12:30:00").unwrap();
        assert_eq!(bare.second(), 0);

        let offset = parse("2024-05-01T14:30:00+02:00").unwrap();
        assert_eq!(offset.hour(), 12);
    }

    #[test]
    fn now_round_trips_exactly() {
        let ts = now();
        assert_eq!(parse(&format(&ts)).unwrap(), ts);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse("yesterday").is_err());
    }
}
