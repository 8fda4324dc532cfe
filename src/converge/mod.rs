//! Membership convergence
//!
//! Drives a replica set from "uninitialized" or "outdated configuration" to
//! "agrees with the target". Initiate and reconfigure are not idempotent on
//! the server, so their expected failures on an already-correct set are
//! classified as benign and the fresh status snapshot decides the verdict.
//!
//! One invocation walks `Start → Initiating → Reconfiguring → Verifying →
//! {Converged | Failed}`, sending each command only after the previous one
//! returned. Nothing is retried; callers may invoke the whole procedure
//! again.

pub mod report;

pub use report::*;

use crate::channel::CommandChannel;
use crate::command::{classify, Command, CommandErrorKind, OkResponse, ADMIN_DATABASE};
use crate::config::MembershipConfig;
use crate::error::{ChannelError, ReplSetError, ReplSetResult};
use crate::status::Status;
use std::fmt;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Stand-in deadline for budgets the clock cannot represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Phases of one convergence attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergencePhase {
    Start,
    Initiating,
    Reconfiguring,
    Verifying,
    CheckingLiveness,
    Converged,
    Failed,
}

impl fmt::Display for ConvergencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvergencePhase::Start => "starting",
            ConvergencePhase::Initiating => "initiating",
            ConvergencePhase::Reconfiguring => "reconfiguring",
            ConvergencePhase::Verifying => "verifying",
            ConvergencePhase::CheckingLiveness => "checking liveness",
            ConvergencePhase::Converged => "converged",
            ConvergencePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Convergence settings
#[derive(Debug, Clone)]
pub struct ConvergenceOptions {
    /// Budget for the whole sequence, including the final ping
    pub timeout: Duration,
    /// Database administrative commands run against
    pub admin_database: String,
    /// Database the final ping runs against
    pub liveness_database: String,
    /// Also require every target host to appear in the fresh status
    pub verify_members: bool,
}

impl Default for ConvergenceOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            admin_database: ADMIN_DATABASE.to_string(),
            liveness_database: ADMIN_DATABASE.to_string(),
            verify_members: false,
        }
    }
}

/// Runs the convergence procedure over a command channel
#[derive(Debug)]
pub struct Converger<C> {
    channel: C,
    options: ConvergenceOptions,
}

impl<C: CommandChannel> Converger<C> {
    pub fn new(channel: C) -> Self {
        Self::with_options(channel, ConvergenceOptions::default())
    }

    pub fn with_options(channel: C, options: ConvergenceOptions) -> Self {
        Self { channel, options }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn options(&self) -> &ConvergenceOptions {
        &self.options
    }

    /// Converge the set behind the channel to `target`
    ///
    /// Succeeds when the reconfigure returned ok or the fresh status shows a
    /// primary, and the node then answers a ping. Genuine initiate or
    /// reconfigure failures only surface, inside
    /// [`ReplSetError::NotConverged`], when that verdict fails.
    pub async fn converge(&self, target: &MembershipConfig) -> ReplSetResult<Converged> {
        target.validate()?;
        let deadline = self.deadline();
        self.enter(ConvergencePhase::Start, target);

        self.enter(ConvergencePhase::Initiating, target);
        let reply = self
            .send(ConvergencePhase::Initiating, &self.options.admin_database, &Command::Initiate(target.initial_config()), deadline)
            .await?;
        let initiate = settle("replSetInitiate", reply, CommandErrorKind::AlreadyInitialized)?;
        log_step("replSetInitiate", &initiate);

        self.enter(ConvergencePhase::Reconfiguring, target);
        let reply = self
            .send(ConvergencePhase::Reconfiguring, &self.options.admin_database, &Command::Reconfig(target.target_config()), deadline)
            .await?;
        let reconfigure = settle("replSetReconfig", reply, CommandErrorKind::VersionNotGreater)?;
        log_step("replSetReconfig", &reconfigure);

        self.enter(ConvergencePhase::Verifying, target);
        let status = match self
            .send(ConvergencePhase::Verifying, &self.options.admin_database, &Command::GetStatus, deadline)
            .await?
        {
            Ok(document) => Ok(Status::from_document(document)?),
            Err(error) => {
                warn!(error = %error, "replSetGetStatus failed");
                Err(error)
            }
        };

        let reconfigured = reconfigure.is_success();
        let primary = status
            .as_ref()
            .ok()
            .and_then(|status| status.primary())
            .map(|member| member.name.clone());
        let missing_hosts = if self.options.verify_members {
            missing_hosts(target, status.as_ref().ok())
        } else {
            Vec::new()
        };

        if !(reconfigured || primary.is_some()) || !missing_hosts.is_empty() {
            let report = ConvergenceReport {
                set_name: target.set_name.clone(),
                initiate,
                reconfigure,
                status,
                missing_hosts,
            };
            self.enter(ConvergencePhase::Failed, target);
            error!(initiate = %report.initiate, "initiate result");
            error!(reconfigure = %report.reconfigure, "reconfigure result");
            match &report.status {
                Ok(status) => error!(status = %status, "status snapshot"),
                Err(error) => error!(error = %error, "status unavailable"),
            }
            return Err(ReplSetError::NotConverged(Box::new(report)));
        }

        self.enter(ConvergencePhase::CheckingLiveness, target);
        self.ping(deadline).await?;

        self.enter(ConvergencePhase::Converged, target);
        info!(
            set = %target.set_name,
            reconfigured,
            primary = primary.as_deref().unwrap_or("<none>"),
            "replica set converged"
        );
        Ok(Converged {
            reconfigured,
            primary,
            status: status.ok(),
        })
    }

    /// Fetch and decode a status snapshot without converging
    pub async fn status(&self) -> ReplSetResult<Status> {
        let deadline = self.deadline();
        let document = self
            .send(ConvergencePhase::Verifying, &self.options.admin_database, &Command::GetStatus, deadline)
            .await??;
        Ok(Status::from_document(document)?)
    }

    async fn ping(&self, deadline: Instant) -> ReplSetResult<()> {
        let reply = self
            .send(ConvergencePhase::CheckingLiveness, &self.options.liveness_database, &Command::Ping, deadline)
            .await?;
        let checked = match reply {
            Ok(document) => OkResponse::from_document("ping", document)?.into_result().map(|_| ()),
            Err(error) => Err(error),
        };
        checked.map_err(|source| ReplSetError::Liveness {
            database: self.options.liveness_database.clone(),
            target: self.channel.describe(),
            source,
        })
    }

    /// Deadline for one invocation; budgets past the clock's range never elapse
    fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.options.timeout)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    /// Send one command, bounded by the invocation deadline
    async fn send(
        &self,
        phase: ConvergencePhase,
        database: &str,
        command: &Command,
        deadline: Instant,
    ) -> ReplSetResult<Result<serde_json::Value, ChannelError>> {
        debug!(command = command.name(), database, "sending command");
        match timeout_at(deadline, self.channel.run_command(database, command)).await {
            Ok(reply) => Ok(reply),
            Err(_) => {
                warn!(command = command.name(), %phase, "deadline elapsed");
                Err(ReplSetError::Timeout {
                    phase,
                    budget: self.options.timeout,
                })
            }
        }
    }

    fn enter(&self, phase: ConvergencePhase, target: &MembershipConfig) {
        debug!(set = %target.set_name, %phase, "convergence phase");
    }
}

/// Classify a reply; `benign` is the one expected failure for this step
fn settle(
    command: &'static str,
    reply: Result<serde_json::Value, ChannelError>,
    benign: CommandErrorKind,
) -> ReplSetResult<StepOutcome> {
    let error = match reply {
        Ok(document) => match OkResponse::from_document(command, document.clone())?.into_result() {
            Ok(_) => return Ok(StepOutcome::Succeeded(document)),
            Err(error) => error,
        },
        Err(error) => error,
    };
    let kind = classify(&error);
    if kind == benign {
        Ok(StepOutcome::Benign { kind, error })
    } else {
        Ok(StepOutcome::Failed(error))
    }
}

fn log_step(command: &str, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Succeeded(_) => info!(command, "command succeeded"),
        StepOutcome::Benign { kind, error } => {
            debug!(command, ?kind, message = error.message(), "expected failure, continuing")
        }
        StepOutcome::Failed(error) => warn!(command, error = %error, "command failed, continuing"),
    }
}

fn missing_hosts(target: &MembershipConfig, status: Option<&Status>) -> Vec<String> {
    target
        .hosts()
        .filter(|host| !status.map_or(false, |status| status.has_member(host)))
        .map(str::to_string)
        .collect()
}
