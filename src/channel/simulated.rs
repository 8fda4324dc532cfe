//! In-process replica-set node
//!
//! Answers the administrative commands the way a single `mongod` would:
//! initiate only once, reconfigure only with a higher version, report status
//! with itself as primary once an election has completed. Replies use the
//! server's own error codes and messages.

use super::CommandChannel;
use crate::command::{Command, ReplSetConfig, ADMIN_DATABASE, ALREADY_INITIALIZED_CODE};
use crate::error::ChannelError;
use crate::status::{Member, MemberState, Optime, Status, StatusOptimes, Timestamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::time::Duration;

#[derive(Debug)]
struct NodeState {
    config: Option<ReplSetConfig>,
    term: i64,
    election_pending: bool,
    unreachable: bool,
    latency: Duration,
    started_at: DateTime<Utc>,
    received: Vec<&'static str>,
}

/// Simulated single node reachable through [`CommandChannel`]
#[derive(Debug)]
pub struct SimulatedNode {
    host: String,
    state: Mutex<NodeState>,
}

impl SimulatedNode {
    /// Create an uninitialized node listening on `host`
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(NodeState {
                config: None,
                term: 0,
                election_pending: false,
                unreachable: false,
                latency: Duration::ZERO,
                started_at: Utc::now(),
                received: Vec::new(),
            }),
        }
    }

    /// Delay every reply by `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Keep the node secondary after initiation until [`SimulatedNode::elect`]
    pub fn set_election_pending(&self, pending: bool) {
        self.state.lock().election_pending = pending;
    }

    /// Complete a pending election
    pub fn elect(&self) {
        let mut state = self.state.lock();
        state.election_pending = false;
        state.term += 1;
    }

    /// Make every command fail at the transport level
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn current_config(&self) -> Option<ReplSetConfig> {
        self.state.lock().config.clone()
    }

    /// Names of the commands this node has answered, in order
    pub fn received(&self) -> Vec<&'static str> {
        self.state.lock().received.clone()
    }

    fn handle(&self, state: &mut NodeState, command: &Command) -> Result<serde_json::Value, ChannelError> {
        match command {
            Command::Initiate(config) => {
                if state.config.is_some() {
                    return Err(ChannelError::with_code(
                        ALREADY_INITIALIZED_CODE,
                        "AlreadyInitialized",
                        "already initialized",
                    ));
                }
                self.check_maps_to_self(config)?;
                state.config = Some(config.clone());
                state.term = 1;
                Ok(json!({"ok": 1}))
            }
            Command::Reconfig(config) => {
                let current = state.config.as_ref().ok_or_else(not_yet_initialized)?;
                if config.set != current.set {
                    return Err(ChannelError::with_code(
                        93,
                        "InvalidReplicaSetConfig",
                        format!(
                            "Attempting to reconfigure a replica set with name {}, but command line reports {}; rejecting",
                            config.set, current.set
                        ),
                    ));
                }
                if config.version <= current.version {
                    return Err(ChannelError::with_code(
                        103,
                        "NewReplicaSetConfigurationIncompatible",
                        format!(
                            "New config is rejected :: caused by :: New replica set configuration version must be greater than old, but {} is not greater than {} for replica set {}",
                            config.version, current.version, current.set
                        ),
                    ));
                }
                self.check_maps_to_self(config)?;
                state.config = Some(config.clone());
                Ok(json!({"ok": 1}))
            }
            Command::GetStatus => Ok(self.status_document(state)),
            Command::Ping => Ok(json!({"ok": 1})),
        }
    }

    fn check_maps_to_self(&self, config: &ReplSetConfig) -> Result<(), ChannelError> {
        if config.members.iter().any(|member| member.host == self.host) {
            return Ok(());
        }
        Err(ChannelError::with_code(
            93,
            "InvalidReplicaSetConfig",
            format!(
                "No host described in new configuration with {{version: {}, term: -1}} for replica set {} maps to this node",
                config.version, config.set
            ),
        ))
    }

    fn status_document(&self, state: &NodeState) -> serde_json::Value {
        let config = match &state.config {
            Some(config) => config,
            None => {
                return json!({
                    "ok": 0,
                    "errmsg": "no replset config has been received",
                    "code": 94,
                    "codeName": "NotYetInitialized",
                })
            }
        };

        let now = Utc::now();
        let optime = Optime::new(Timestamp::new(timestamp_seconds(&now), 1), state.term);
        let self_state = if state.election_pending {
            MemberState::Secondary
        } else {
            MemberState::Primary
        };

        let members = config
            .members
            .iter()
            .map(|entry| {
                let is_self = entry.host == self.host;
                let mut member = Member::new(
                    entry.id,
                    entry.host.clone(),
                    if is_self { self_state } else { MemberState::Secondary },
                );
                member.is_self = is_self;
                member.config_version = config.version;
                member.optime = Some(optime);
                member.optime_date = Some(now);
                member.optime_durable = Some(optime);
                member.optime_durable_date = Some(now);
                if is_self {
                    member.uptime = (now - state.started_at).num_seconds();
                } else {
                    member.last_heartbeat = Some(now);
                    member.last_heartbeat_recv = Some(now);
                    member.ping_ms = Some(0);
                }
                member
            })
            .collect();

        let status = Status {
            set: config.set.clone(),
            date: Some(now),
            my_state: Some(self_state),
            members,
            term: Some(state.term),
            heartbeat_interval_millis: Some(2000),
            optimes: Some(StatusOptimes {
                last_committed: Some(optime),
                applied: Some(optime),
                durable: Some(optime),
            }),
            errmsg: String::new(),
            ok: 1,
        };
        serde_json::to_value(&status).unwrap_or_else(|e| json!({"ok": 0, "errmsg": e.to_string()}))
    }
}

/// Replication timestamps hold unsigned 32-bit seconds; out-of-range clocks saturate
fn timestamp_seconds(now: &DateTime<Utc>) -> u32 {
    u32::try_from(now.timestamp().max(0)).unwrap_or(u32::MAX)
}

fn not_yet_initialized() -> ChannelError {
    ChannelError::with_code(94, "NotYetInitialized", "no replset config has been received")
}

#[async_trait]
impl CommandChannel for SimulatedNode {
    async fn run_command(&self, database: &str, command: &Command) -> Result<serde_json::Value, ChannelError> {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        if state.unreachable {
            return Err(ChannelError::transport(format!(
                "connection refused: {}",
                self.host
            )));
        }
        state.received.push(command.name());

        if database != ADMIN_DATABASE && !matches!(command, Command::Ping) {
            return Err(ChannelError::with_code(
                13,
                "Unauthorized",
                format!("{} may only be run against the admin database.", command.name()),
            ));
        }
        self.handle(&mut state, command)
    }

    fn describe(&self) -> String {
        self.host.clone()
    }
}
