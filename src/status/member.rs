//! Replica-set members as reported by `replSetGetStatus`

use super::optime::{deserialize_number, lenient_int, optional_date, Optime, Timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Replication state of a member
///
/// Mirrors the server's numeric encoding. There is no code 4, so
/// `Startup2` is 5. Codes this crate does not know decode to
/// [`MemberState::Unrecognized`] and keep their raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberState {
    Startup,
    Primary,
    Secondary,
    Recovering,
    Startup2,
    Unknown,
    Arbiter,
    Down,
    Rollback,
    Removed,
    /// Any code outside the ten defined states
    Unrecognized(i64),
}

impl MemberState {
    /// All defined states, in code order
    pub const KNOWN: [MemberState; 10] = [
        MemberState::Startup,
        MemberState::Primary,
        MemberState::Secondary,
        MemberState::Recovering,
        MemberState::Startup2,
        MemberState::Unknown,
        MemberState::Arbiter,
        MemberState::Down,
        MemberState::Rollback,
        MemberState::Removed,
    ];

    /// Decode a wire code. Total: never fails.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => MemberState::Startup,
            1 => MemberState::Primary,
            2 => MemberState::Secondary,
            3 => MemberState::Recovering,
            5 => MemberState::Startup2,
            6 => MemberState::Unknown,
            7 => MemberState::Arbiter,
            8 => MemberState::Down,
            9 => MemberState::Rollback,
            10 => MemberState::Removed,
            other => MemberState::Unrecognized(other),
        }
    }

    /// Wire code
    pub fn code(&self) -> i64 {
        match self {
            MemberState::Startup => 0,
            MemberState::Primary => 1,
            MemberState::Secondary => 2,
            MemberState::Recovering => 3,
            MemberState::Startup2 => 5,
            MemberState::Unknown => 6,
            MemberState::Arbiter => 7,
            MemberState::Down => 8,
            MemberState::Rollback => 9,
            MemberState::Removed => 10,
            MemberState::Unrecognized(code) => *code,
        }
    }

    /// Canonical display name; empty for unrecognized codes
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberState::Startup => "STARTUP",
            MemberState::Primary => "PRIMARY",
            MemberState::Secondary => "SECONDARY",
            MemberState::Recovering => "RECOVERING",
            MemberState::Startup2 => "STARTUP2",
            MemberState::Unknown => "UNKNOWN",
            MemberState::Arbiter => "ARBITER",
            MemberState::Down => "DOWN",
            MemberState::Rollback => "ROLLBACK",
            MemberState::Removed => "REMOVED",
            MemberState::Unrecognized(_) => "",
        }
    }

    /// Parse a canonical display name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::KNOWN
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(name))
    }
}

impl From<i64> for MemberState {
    fn from(code: i64) -> Self {
        MemberState::from_code(code)
    }
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MemberState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for MemberState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_int::deserialize(deserializer).map(MemberState::from_code)
    }
}

/// Reachability of a member as seen by the queried node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberHealth {
    Down,
    Up,
}

impl MemberHealth {
    pub fn code(&self) -> i64 {
        match self {
            MemberHealth::Down => 0,
            MemberHealth::Up => 1,
        }
    }
}

impl Serialize for MemberHealth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for MemberHealth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // The server reports health as a double
        let value = deserialize_number(deserializer)?;
        Ok(if value == 0.0 { MemberHealth::Down } else { MemberHealth::Up })
    }
}

/// One node's reported status within a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub health: MemberHealth,
    pub state: MemberState,
    /// State name exactly as transmitted; may disagree with `state`
    #[serde(rename = "stateStr", default)]
    pub state_str: String,
    /// Seconds the member has been up
    #[serde(default)]
    pub uptime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optime: Option<Optime>,
    #[serde(rename = "optimeDate", default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub optime_date: Option<DateTime<Utc>>,
    #[serde(rename = "configVersion", default)]
    pub config_version: i64,
    #[serde(rename = "electionTime", default, skip_serializing_if = "Option::is_none")]
    pub election_time: Option<Timestamp>,
    #[serde(rename = "electionDate", default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub election_date: Option<DateTime<Utc>>,
    #[serde(rename = "infoMessage", default, skip_serializing_if = "String::is_empty")]
    pub info_message: String,
    #[serde(rename = "optimeDurable", default, skip_serializing_if = "Option::is_none")]
    pub optime_durable: Option<Optime>,
    #[serde(rename = "optimeDurableDate", default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub optime_durable_date: Option<DateTime<Utc>>,
    #[serde(rename = "lastHeartbeat", default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(rename = "lastHeartbeatRecv", default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_recv: Option<DateTime<Utc>>,
    /// Heartbeat round-trip time in milliseconds
    #[serde(rename = "pingMs", default, skip_serializing_if = "Option::is_none")]
    pub ping_ms: Option<i64>,
    /// True only for the member that answered the status query
    #[serde(rename = "self", default, skip_serializing_if = "is_false")]
    pub is_self: bool,
    /// Member this one replicates from
    #[serde(rename = "syncingTo", default, skip_serializing_if = "Option::is_none")]
    pub syncing_to: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Member {
    /// Create a member with the given identity and state; all progress fields empty
    pub fn new(id: i64, name: impl Into<String>, state: MemberState) -> Self {
        Self {
            id,
            name: name.into(),
            health: MemberHealth::Up,
            state,
            state_str: state.as_str().to_string(),
            uptime: 0,
            optime: None,
            optime_date: None,
            config_version: 0,
            election_time: None,
            election_date: None,
            info_message: String::new(),
            optime_durable: None,
            optime_durable_date: None,
            last_heartbeat: None,
            last_heartbeat_recv: None,
            ping_ms: None,
            is_self: false,
            syncing_to: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health == MemberHealth::Up
    }

    pub fn is_primary(&self) -> bool {
        self.state == MemberState::Primary
    }

    /// True when the transmitted `stateStr` disagrees with the numeric state
    pub fn state_str_diverges(&self) -> bool {
        self.state_str != self.state.as_str()
    }
}
