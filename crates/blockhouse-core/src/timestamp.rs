//! Store timestamp formatting
//!
//! The store's `DateTime64(3)` column rejects ISO-8601 text with a `T`
//! separator or a `Z` suffix. Observation times are already UTC, so the
//! conversion is purely textual: swap the separator, drop the zone marker.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};

const STORE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// `2024-01-02T03:04:05.678Z` -> `2024-01-02 03:04:05.678`
pub fn to_store_timestamp(iso: &str) -> String {
    iso.replacen('T', " ", 1).replacen('Z', "", 1)
}

/// Render a UTC instant with millisecond precision in store format.
pub fn format_store_timestamp(at: &DateTime<Utc>) -> String {
    to_store_timestamp(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Parse a store-format timestamp back into a UTC instant.
pub fn parse_store_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, STORE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Serde adapter storing a `DateTime<Utc>` in store format.
pub mod store_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_store_timestamp(at))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_store_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
