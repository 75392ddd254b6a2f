//! UTC timestamp helpers shared by every store.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{TlxError, TlxResult};

/// Current UTC time truncated to whole seconds.
pub fn now() -> DateTime<Utc> {
    truncate_secs(Utc::now())
}

/// Current UTC time as RFC 3339 with a `+00:00` offset and second precision.
pub fn now_iso() -> String {
    to_iso(now())
}

pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub fn truncate_secs(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(dt.timestamp(), 0).single().unwrap_or(dt)
}

/// Daily usage bucket, `YYYY-MM-DD`.
pub fn day_key(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// Monthly usage bucket, `YYYY-MM`.
pub fn month_key(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m").to_string()
}

/// Parse an ISO 8601 timestamp. Accepts `Z`, explicit offsets, and naive
/// values (taken as UTC).
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(v) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    None
}

/// Validate a `scheduled_at` style field, returning the parsed instant.
pub fn require_iso8601(field: &str, value: &str) -> TlxResult<DateTime<Utc>> {
    parse_iso8601(value)
        .ok_or_else(|| TlxError::bad_request(format!("{field} must be ISO 8601")))
}

/// Unix seconds to RFC 3339; `None` for zero or missing values.
pub fn unix_to_iso(ts: Option<i64>) -> Option<String> {
    match ts {
        Some(t) if t > 0 => Utc.timestamp_opt(t, 0).single().map(to_iso),
        _ => None,
    }
}

/// Serde adapter writing timestamps the way [`to_iso`] does
/// (`2026-01-11T15:00:00+00:00`). Use with `#[serde(with = "iso")]`.
pub mod iso {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&super::to_iso(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        super::parse_iso8601(&raw).ok_or_else(|| serde::de::Error::custom("invalid ISO 8601 timestamp"))
    }

    /// Same, for optional timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, ser: S) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => ser.serialize_some(&crate::time::to_iso(*dt)),
                None => ser.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(de)? {
                Some(raw) => crate::time::parse_iso8601(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom("invalid ISO 8601 timestamp")),
                None => Ok(None),
            }
        }
    }
}
