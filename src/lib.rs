//! # replset
//!
//! Replica-set status model and membership convergence.
//!
//! [`Status`] is an immutable, decoded `replSetGetStatus` snapshot with
//! read-only queries over its member list. [`Converger`] drives a set to a
//! target [`MembershipConfig`] through a [`CommandChannel`], treating the
//! server's "already initialized" and "version must be greater" replies as
//! signs that the work is already done.

#![warn(clippy::all)]

pub mod channel;
pub mod command;
pub mod config;
pub mod converge;
pub mod error;
pub mod status;

/// Command-line interface and argument parsing
pub mod cli;
/// Command execution
pub mod commands;

// Re-export main types
pub use channel::{CommandChannel, ScriptedChannel, SimulatedNode};
pub use command::{classify, classify_message, Command, CommandErrorKind, ConfigMember, OkResponse, ReplSetConfig};
pub use config::{ConnectionSettings, MembershipConfig, TopologyFile};
pub use converge::{Converged, ConvergenceOptions, ConvergencePhase, ConvergenceReport, Converger, StepOutcome};
pub use error::{ChannelError, ConfigError, DecodeError, ReplSetError, ReplSetResult};
pub use status::{Member, MemberHealth, MemberState, Optime, Status, StatusOptimes, Timestamp};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
