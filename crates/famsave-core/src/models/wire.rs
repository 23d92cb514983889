//! Serde helpers for the backend's wire formats.
//!
//! The savings API serializes decimal columns either as JSON numbers or as
//! decimal strings (`"5000.00"`), and timestamps either with an offset or as
//! naive UTC (`"2024-03-01T09:30:00.123456"`). These helpers accept both.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

fn parse_amount<E: serde::de::Error>(raw: RawAmount) -> Result<f64, E> {
    match raw {
        RawAmount::Number(n) => Ok(n),
        RawAmount::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| E::custom(format!("invalid amount: {:?}", s))),
    }
}

/// A finite amount above zero. JSON has no encoding for infinities, so
/// those would reach the server as `null`.
pub(crate) fn is_positive_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

fn parse_timestamp<E: serde::de::Error>(s: &str) -> Result<DateTime<Utc>, E> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| E::custom(format!("invalid timestamp: {:?}", s)))
}

pub mod amount {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        parse_amount(RawAmount::deserialize(deserializer)?)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        match Option::<RawAmount>::deserialize(deserializer)? {
            Some(raw) => parse_amount(raw).map(Some),
            None => Ok(None),
        }
    }
}

pub mod timestamp {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_timestamp(&s)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => parse_timestamp(&s).map(Some),
            None => Ok(None),
        }
    }
}
