//! Step outcomes and convergence verdicts

use crate::command::CommandErrorKind;
use crate::error::ChannelError;
use crate::status::Status;
use std::fmt;

/// Result of one initiate/reconfigure step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The server accepted the command; raw reply
    Succeeded(serde_json::Value),
    /// Expected failure: the end state may already hold
    Benign {
        kind: CommandErrorKind,
        error: ChannelError,
    },
    /// Genuine failure; logged, not fatal on its own
    Failed(ChannelError),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded(_))
    }

    pub fn is_benign(&self) -> bool {
        matches!(self, StepOutcome::Benign { .. })
    }

    /// The error behind a genuine failure
    pub fn failure(&self) -> Option<&ChannelError> {
        match self {
            StepOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Succeeded(_) => write!(f, "ok"),
            StepOutcome::Benign { kind, error } => write!(f, "benign {:?}: {}", kind, error.message()),
            StepOutcome::Failed(error) => write!(f, "failed: {}", error),
        }
    }
}

/// Everything observed during a failed convergence attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceReport {
    pub set_name: String,
    pub initiate: StepOutcome,
    pub reconfigure: StepOutcome,
    /// Fresh snapshot, or why it could not be fetched
    pub status: Result<Status, ChannelError>,
    /// Target hosts absent from the snapshot (only checked when member verification is on)
    pub missing_hosts: Vec<String>,
}

impl ConvergenceReport {
    /// First genuine failure, in the order reconfigure, initiate, status
    pub fn cause(&self) -> Option<&ChannelError> {
        self.reconfigure
            .failure()
            .or_else(|| self.initiate.failure())
            .or_else(|| self.status.as_ref().err())
    }

    pub fn primary(&self) -> Option<&str> {
        self.status
            .as_ref()
            .ok()
            .and_then(|status| status.primary())
            .map(|member| member.name.as_str())
    }
}

impl fmt::Display for ConvergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "set {}: initiate {}; reconfigure {}; ",
            self.set_name, self.initiate, self.reconfigure
        )?;
        match &self.status {
            Ok(status) if status.is_ok() => write!(f, "status: no primary among {} members", status.members.len())?,
            Ok(status) => write!(f, "status: ok={} {}", status.ok, status.errmsg)?,
            Err(error) => write!(f, "status failed: {}", error)?,
        }
        if !self.missing_hosts.is_empty() {
            write!(f, "; missing hosts: {}", self.missing_hosts.join(", "))?;
        }
        Ok(())
    }
}

/// Successful convergence
#[derive(Debug, Clone, PartialEq)]
pub struct Converged {
    /// The reconfigure command itself returned ok
    pub reconfigured: bool,
    /// Primary reported by the fresh snapshot
    pub primary: Option<String>,
    pub status: Option<Status>,
}
