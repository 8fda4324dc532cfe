//! Replica-set status snapshots
//!
//! A [`Status`] is decoded once from a single `replSetGetStatus` response and
//! never mutated afterwards. Every query returns `Option`/`Vec`: a missing
//! member or primary is an ordinary state (e.g. during an election), not an
//! error.

pub mod member;
pub mod optime;

pub use member::*;
pub use optime::{Optime, StatusOptimes, Timestamp};

use crate::error::DecodeError;
use chrono::{DateTime, Utc};
use optime::{lenient_int, optional_date};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the status command
pub const STATUS_COMMAND: &str = "replSetGetStatus";

/// Point-in-time snapshot of replica-set topology and replication progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Replica-set name
    #[serde(default)]
    pub set: String,
    #[serde(default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// State of the node that answered the query
    #[serde(rename = "myState", default, skip_serializing_if = "Option::is_none")]
    pub my_state: Option<MemberState>,
    /// Members in the order the server returned them
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<i64>,
    #[serde(rename = "heartbeatIntervalMillis", default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_millis: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimes: Option<StatusOptimes>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub errmsg: String,
    #[serde(with = "lenient_int")]
    pub ok: i64,
}

impl Status {
    /// Decode a status response document
    pub fn from_document(document: serde_json::Value) -> Result<Self, DecodeError> {
        serde_json::from_value(document).map_err(|e| DecodeError::new(STATUS_COMMAND, e))
    }

    /// Decode a status response from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::new(STATUS_COMMAND, e))
    }

    /// Whether the status command itself succeeded
    pub fn is_ok(&self) -> bool {
        self.ok == 1 && self.errmsg.is_empty()
    }

    /// The member that answered the query, if it is part of the set
    pub fn get_self(&self) -> Option<&Member> {
        self.members.iter().find(|member| member.is_self)
    }

    pub fn get_member_by_name(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name == name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.get_member_by_name(name).is_some()
    }

    pub fn get_member_by_id(&self, id: i64) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    /// Members in `state`, in snapshot order
    ///
    /// A positive `limit` truncates the result to at most `limit` members;
    /// zero or negative means no limit.
    pub fn get_members_by_state(&self, state: MemberState, limit: i64) -> Vec<&Member> {
        let matching = self.members.iter().filter(|member| member.state == state);
        if limit > 0 {
            matching.take(limit as usize).collect()
        } else {
            matching.collect()
        }
    }

    /// The current primary, if one has been elected
    pub fn primary(&self) -> Option<&Member> {
        self.get_members_by_state(MemberState::Primary, 1).into_iter().next()
    }

    pub fn secondaries(&self) -> Vec<&Member> {
        self.get_members_by_state(MemberState::Secondary, 0)
    }

    pub fn arbiters(&self) -> Vec<&Member> {
        self.get_members_by_state(MemberState::Arbiter, 0)
    }

    /// How far `name` trails the primary, by optime wall-clock dates
    pub fn replication_lag(&self, name: &str) -> Option<chrono::Duration> {
        let primary_date = self.primary()?.optime_date?;
        let member_date = self.get_member_by_name(name)?.optime_date?;
        Some(primary_date - member_date)
    }

    /// Tab-indented JSON with a fixed key order
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(out)
    }

    /// Diagnostic text form; identical field values always render identically
    pub fn to_text(&self) -> String {
        self.to_json()
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
