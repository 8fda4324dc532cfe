//! Replication positions and wire-format helpers
//!
//! Optimes identify a position in the replication log. The helpers in this
//! module accept both relaxed and canonical extended-JSON encodings on input
//! and always emit a single canonical form on output.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Replication timestamp: seconds since the epoch plus an ordinal within that second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp {
    /// Seconds since the Unix epoch
    pub time: u32,
    /// Ordinal of the operation within `time`
    pub increment: u32,
}

impl Timestamp {
    pub fn new(time: u32, increment: u32) -> Self {
        Self { time, increment }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}, {})", self.time, self.increment)
    }
}

#[derive(Serialize, Deserialize)]
struct RawTimestamp {
    t: u32,
    i: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Extended {
        #[serde(rename = "$timestamp")]
        inner: RawTimestamp,
    },
    Plain(RawTimestamp),
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawTimestamp { t: self.time, i: self.increment }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match TimestampRepr::deserialize(deserializer)? {
            TimestampRepr::Extended { inner } => inner,
            TimestampRepr::Plain(raw) => raw,
        };
        Ok(Timestamp::new(raw.t, raw.i))
    }
}

/// Position in the replication log
///
/// Ordering is lexicographic over `(timestamp, term)`, which is the
/// authority for how far a member has replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Optime {
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    #[serde(rename = "t")]
    pub term: i64,
}

impl Optime {
    pub fn new(timestamp: Timestamp, term: i64) -> Self {
        Self { timestamp, term }
    }
}

impl fmt::Display for Optime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ts: {}, t: {} }}", self.timestamp, self.term)
    }
}

/// Cluster-wide optime rollup reported alongside the member list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusOptimes {
    #[serde(rename = "lastCommittedOpTime", default, skip_serializing_if = "Option::is_none")]
    pub last_committed: Option<Optime>,
    #[serde(rename = "appliedOpTime", default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<Optime>,
    #[serde(rename = "durableOpTime", default, skip_serializing_if = "Option::is_none")]
    pub durable: Option<Optime>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateValue {
    Millis(i64),
    Text(String),
    NumberLong {
        #[serde(rename = "$numberLong")]
        millis: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateRepr {
    Extended {
        #[serde(rename = "$date")]
        date: DateValue,
    },
    Value(DateValue),
}

fn date_from_repr<E: de::Error>(repr: DateRepr) -> Result<DateTime<Utc>, E> {
    let value = match repr {
        DateRepr::Extended { date } => date,
        DateRepr::Value(value) => value,
    };
    let millis = match value {
        DateValue::Text(text) => {
            return DateTime::parse_from_rfc3339(&text)
                .map(|date| date.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid date {:?}: {}", text, e)));
        }
        DateValue::Millis(millis) => millis,
        DateValue::NumberLong { millis } => millis
            .parse::<i64>()
            .map_err(|e| E::custom(format!("invalid $numberLong {:?}: {}", millis, e)))?,
    };
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| E::custom(format!("date out of range: {} ms", millis)))
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Optional dates: RFC 3339 text, epoch millis or `{"$date": ...}` in; RFC 3339 out
pub(crate) mod optional_date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_some(&format_date(date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<DateRepr>::deserialize(deserializer)? {
            Some(repr) => date_from_repr(repr).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(i64),
    Float(f64),
}

/// Integers the server may send as doubles (`ok: 1.0`)
pub(crate) mod lenient_int {
    use super::*;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match NumberRepr::deserialize(deserializer)? {
            NumberRepr::Int(value) => Ok(value),
            NumberRepr::Float(value) if value.fract() == 0.0 => Ok(value as i64),
            NumberRepr::Float(value) => Err(de::Error::custom(format!("expected an integral number, got {}", value))),
        }
    }
}

pub(crate) fn deserialize_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match NumberRepr::deserialize(deserializer)? {
        NumberRepr::Int(value) => value as f64,
        NumberRepr::Float(value) => value,
    })
}
