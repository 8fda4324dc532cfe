//! Channel that replays canned replies
//!
//! Useful for reproducing a captured exchange or a failure mode that a live
//! node will not produce on demand.

use super::CommandChannel;
use crate::command::Command;
use crate::error::ChannelError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

type Reply = Result<serde_json::Value, ChannelError>;

/// A command observed by a [`ScriptedChannel`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentCommand {
    pub database: String,
    pub document: serde_json::Value,
}

/// Replays queued replies in order, then a fallback reply
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    sent: Mutex<Vec<SentCommand>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose every call fails at the transport level
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            fallback: Some(Err(ChannelError::transport(message))),
            ..Self::default()
        }
    }

    /// Queue a successful reply
    pub fn reply(self, document: serde_json::Value) -> Self {
        self.replies.lock().push_back(Ok(document));
        self
    }

    /// Queue a failure
    pub fn fail(self, error: ChannelError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Commands sent so far, in order
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    /// Names of the commands sent so far
    pub fn sent_names(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|sent| sent.document.as_object()?.keys().next().cloned())
            .collect()
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn run_command(&self, database: &str, command: &Command) -> Result<serde_json::Value, ChannelError> {
        self.sent.lock().push(SentCommand {
            database: database.to_string(),
            document: command.to_document(),
        });

        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(reply) => reply.clone(),
            None => Err(ChannelError::transport(format!(
                "no scripted reply left for {}",
                command.name()
            ))),
        }
    }

    fn describe(&self) -> String {
        "scripted channel".to_string()
    }
}
