//! Error types for replica-set status decoding and convergence

use crate::converge::{ConvergencePhase, ConvergenceReport};
use std::time::Duration;
use thiserror::Error;

/// Result type for replica-set operations
pub type ReplSetResult<T> = Result<T, ReplSetError>;

/// Terminal error of a replica-set operation
#[derive(Error, Debug)]
pub enum ReplSetError {
    /// The command channel failed outside of the convergence sequence
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A response did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The target membership is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Neither the reconfigure nor the status check showed a working set
    #[error("Replica set did not converge: {0}")]
    NotConverged(Box<ConvergenceReport>),

    /// Administrative commands succeeded but the node does not answer pings
    #[error("Could not ping database {database} on {target}: {source}")]
    Liveness {
        target: String,
        database: String,
        #[source]
        source: ChannelError,
    },

    /// The deadline elapsed while a command was outstanding
    #[error("Timed out while {phase} (budget {budget:?})")]
    Timeout {
        phase: ConvergencePhase,
        budget: Duration,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReplSetError {
    /// Whether this is a deadline failure rather than a command failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReplSetError::Timeout { .. })
    }
}

/// Failure reported by a command channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Connection, authentication or dispatch failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server executed the command and rejected it
    #[error("command failed: {message}")]
    Command {
        code: Option<i32>,
        code_name: Option<String>,
        message: String,
    },
}

impl ChannelError {
    pub fn transport(message: impl Into<String>) -> Self {
        ChannelError::Transport(message.into())
    }

    /// Command failure with no structured code
    pub fn command(message: impl Into<String>) -> Self {
        ChannelError::Command {
            code: None,
            code_name: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, code_name: impl Into<String>, message: impl Into<String>) -> Self {
        ChannelError::Command {
            code: Some(code),
            code_name: Some(code_name.into()),
            message: message.into(),
        }
    }

    /// Raw message text, as used for classification
    pub fn message(&self) -> &str {
        match self {
            ChannelError::Transport(message) => message,
            ChannelError::Command { message, .. } => message,
        }
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ChannelError::Transport(_) => None,
            ChannelError::Command { code, .. } => *code,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ChannelError::Transport(_))
    }
}

/// A response document that could not be decoded
#[derive(Error, Debug)]
#[error("failed to decode {what} response: {source}")]
pub struct DecodeError {
    /// Command whose response failed to decode
    pub what: &'static str,
    #[source]
    pub source: serde_json::Error,
}

impl DecodeError {
    pub fn new(what: &'static str, source: serde_json::Error) -> Self {
        Self { what, source }
    }
}

/// Invalid target membership configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("replica set name must not be empty")]
    EmptySetName,

    #[error("replica set {0} has no members")]
    NoMembers(String),

    #[error("member id {0} appears more than once")]
    DuplicateId(i64),

    #[error("member host {0} appears more than once")]
    DuplicateHost(String),

    #[error("member {0} has an empty host")]
    EmptyHost(i64),

    #[error("configuration version must be at least 1, got {0}")]
    InvalidVersion(i64),

    #[error("invalid topology file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_accessors() {
        let transport = ChannelError::transport("connection refused");
        assert!(transport.is_transport());
        assert_eq!(transport.message(), "connection refused");
        assert_eq!(transport.code(), None);

        let command = ChannelError::with_code(23, "AlreadyInitialized", "already initialized");
        assert!(!command.is_transport());
        assert_eq!(command.code(), Some(23));
        assert_eq!(command.to_string(), "command failed: already initialized");
    }

    #[test]
    fn test_timeout_display_names_phase() {
        let err = ReplSetError::Timeout {
            phase: ConvergencePhase::Reconfiguring,
            budget: Duration::from_secs(10),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timed out while reconfiguring (budget 10s)");
    }
}
