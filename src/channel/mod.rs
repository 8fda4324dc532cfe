//! Command channel - the narrow interface to a database node
//!
//! Connection setup, authentication and transport belong to whatever
//! implements [`CommandChannel`]. The convergence procedure only needs to
//! send a command to a database and get back a document or an error with
//! inspectable text.

pub mod scripted;
pub mod simulated;

pub use scripted::ScriptedChannel;
pub use simulated::SimulatedNode;

use crate::command::Command;
use crate::error::ChannelError;
use async_trait::async_trait;
use std::sync::Arc;

/// Channel that dispatches administrative commands to exactly one node
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Run `command` against `database` and return the raw reply document
    async fn run_command(&self, database: &str, command: &Command) -> Result<serde_json::Value, ChannelError>;

    /// Human-readable target, used in liveness errors
    fn describe(&self) -> String {
        "command channel".to_string()
    }
}

#[async_trait]
impl<T: CommandChannel + ?Sized> CommandChannel for Arc<T> {
    async fn run_command(&self, database: &str, command: &Command) -> Result<serde_json::Value, ChannelError> {
        (**self).run_command(database, command).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
