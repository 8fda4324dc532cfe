//! Administrative command documents and result classification
//!
//! Commands are typed request structures. Their `Serialize` output is the
//! wire document, with keys in declaration order.

use crate::error::{ChannelError, DecodeError};
use crate::status::optime::lenient_int;
use crate::status::STATUS_COMMAND;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Database that administrative commands run against
pub const ADMIN_DATABASE: &str = "admin";

/// Election protocol version sent with every configuration
pub const PROTOCOL_VERSION: i64 = 1;

/// Version used for first-time initialization
pub const INITIAL_CONFIG_VERSION: i64 = 1;

/// Message fragment returned when initiating an already-initiated set
pub const ALREADY_INITIALIZED: &str = "already initialized";

/// Message fragment returned when a reconfigure does not bump the version
pub const VERSION_NOT_GREATER: &str = "configuration version must be greater than old";

/// Server error code for `AlreadyInitialized`
pub const ALREADY_INITIALIZED_CODE: i32 = 23;

/// One entry of a replica-set configuration's member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMember {
    #[serde(rename = "_id")]
    pub id: i64,
    pub host: String,
}

impl ConfigMember {
    pub fn new(id: i64, host: impl Into<String>) -> Self {
        Self { id, host: host.into() }
    }
}

/// Replica-set configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplSetConfig {
    #[serde(rename = "_id")]
    pub set: String,
    pub version: i64,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: i64,
    pub members: Vec<ConfigMember>,
}

/// Administrative commands issued by the convergence procedure
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `{ replSetInitiate: <config> }`
    Initiate(ReplSetConfig),
    /// `{ replSetReconfig: <config> }`
    Reconfig(ReplSetConfig),
    /// `{ replSetGetStatus: null }`
    GetStatus,
    /// `{ ping: 1 }`
    Ping,
}

impl Command {
    /// Command name, i.e. the first (and only) key of the document
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initiate(_) => "replSetInitiate",
            Command::Reconfig(_) => "replSetReconfig",
            Command::GetStatus => STATUS_COMMAND,
            Command::Ping => "ping",
        }
    }

    /// Wire document as a JSON value
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Command::Initiate(config) | Command::Reconfig(config) => map.serialize_entry(self.name(), config)?,
            Command::GetStatus => map.serialize_entry(self.name(), &())?,
            Command::Ping => map.serialize_entry(self.name(), &1)?,
        }
        map.end()
    }
}

/// Generic `{ ok, errmsg, code, codeName }` command reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OkResponse {
    #[serde(with = "lenient_int")]
    pub ok: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub errmsg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(rename = "codeName", default, skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,
}

impl OkResponse {
    pub fn from_document(command: &'static str, document: serde_json::Value) -> Result<Self, DecodeError> {
        serde_json::from_value(document).map_err(|e| DecodeError::new(command, e))
    }

    pub fn is_ok(&self) -> bool {
        self.ok == 1
    }

    /// Turn an `ok: 0` reply into the command error it describes
    pub fn into_result(self) -> Result<Self, ChannelError> {
        if self.is_ok() {
            return Ok(self);
        }
        Err(ChannelError::Command {
            code: self.code,
            code_name: self.code_name,
            message: self.errmsg,
        })
    }
}

/// Classification of a failed initiate/reconfigure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// The set already has a configuration; the initiate was redundant
    AlreadyInitialized,
    /// The submitted version does not exceed the current one
    VersionNotGreater,
    /// A genuine failure
    Other,
}

impl CommandErrorKind {
    /// Benign kinds mean the desired end state may already hold
    pub fn is_benign(&self) -> bool {
        !matches!(self, CommandErrorKind::Other)
    }
}

/// Classify raw error text
///
/// The version check has no dedicated error code (103 also covers unrelated
/// rejections), so it is recognized by message text alone.
pub fn classify_message(message: &str) -> CommandErrorKind {
    if message.contains(ALREADY_INITIALIZED) {
        CommandErrorKind::AlreadyInitialized
    } else if message.contains(VERSION_NOT_GREATER) {
        CommandErrorKind::VersionNotGreater
    } else {
        CommandErrorKind::Other
    }
}

/// Classify a channel error, using the structured code when the server sent one
pub fn classify(error: &ChannelError) -> CommandErrorKind {
    if let ChannelError::Command { code, code_name, .. } = error {
        if *code == Some(ALREADY_INITIALIZED_CODE) || code_name.as_deref() == Some("AlreadyInitialized") {
            return CommandErrorKind::AlreadyInitialized;
        }
    }
    classify_message(error.message())
}
