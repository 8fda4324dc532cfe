use crate::channel::SimulatedNode;
use crate::cli::{print_banner, Commands};
use crate::command::Command;
use crate::config::{ConnectionSettings, MembershipConfig, TopologyFile};
use crate::converge::{ConvergenceOptions, Converger};
use crate::error::ReplSetError;
use crate::status::{Member, MemberState, Status};
use anyhow::{anyhow, Context, Result};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub async fn execute_command(command: Commands, settings: ConnectionSettings, verbose: bool) -> Result<()> {
    if verbose {
        print_banner(&settings);
    }
    match command {
        Commands::Status { file, json, member, state, limit } => execute_status(&file, json, member, state, limit),
        Commands::Plan { topology } => execute_plan(topology, &settings),
        Commands::Simulate { topology, runs, election_pending, timeout, verify_members } => {
            let options = simulate_options(&settings, timeout, verify_members);
            execute_simulate(topology, &settings, runs, election_pending, options).await
        }
    }
}

fn simulate_options(settings: &ConnectionSettings, timeout: u64, verify_members: bool) -> ConvergenceOptions {
    ConvergenceOptions {
        timeout: Duration::from_secs(timeout),
        liveness_database: settings.database.clone(),
        verify_members,
        ..ConvergenceOptions::default()
    }
}

fn load_membership(topology: Option<PathBuf>, settings: &ConnectionSettings) -> Result<MembershipConfig> {
    match topology {
        Some(path) => {
            let file = TopologyFile::load(&path).with_context(|| format!("reading topology {}", path.display()))?;
            Ok(file.into_membership()?)
        }
        None => Ok(settings.membership()),
    }
}

fn execute_status(file: &Path, json: bool, member: Option<String>, state: Option<String>, limit: i64) -> Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let status = Status::from_slice(&raw)?;

    if json {
        println!("{}", status.to_text());
        return Ok(());
    }

    if let Some(name) = member {
        let found = status
            .get_member_by_name(&name)
            .ok_or_else(|| anyhow!("no member named {} in set {}", name, status.set))?;
        print_member(found);
        return Ok(());
    }

    if let Some(state_name) = state {
        let state = MemberState::from_name(&state_name).ok_or_else(|| anyhow!("unknown member state: {}", state_name))?;
        for found in status.get_members_by_state(state, limit) {
            print_member(found);
        }
        return Ok(());
    }

    print_summary(&status);
    Ok(())
}

fn print_summary(status: &Status) {
    if !status.is_ok() {
        println!("{} ok={} {}", "Status command failed:".bright_red().bold(), status.ok, status.errmsg);
        return;
    }

    println!("{} {}", "Replica set:".bright_yellow().bold(), status.set.bright_green());
    if let Some(date) = status.date {
        println!("  Date: {}", date.to_rfc3339());
    }
    if let Some(term) = status.term {
        println!("  Term: {}", term);
    }
    match status.primary() {
        Some(primary) => println!("  Primary: {}", primary.name.bright_green()),
        None => println!("  Primary: {}", "none".bright_red()),
    }
    println!("  Secondaries: {}", status.secondaries().len());
    println!();

    println!("{}", "Members:".bright_yellow().bold());
    for member in &status.members {
        print_member(member);
        if !member.is_primary() {
            if let Some(lag) = status.replication_lag(&member.name) {
                println!("      lag: {:.3}s", lag.num_milliseconds() as f64 / 1000.0);
            }
        }
    }
}

fn print_member(member: &Member) {
    let state = if member.state_str.is_empty() {
        member.state.to_string()
    } else {
        member.state_str.clone()
    };
    let state = match member.state {
        MemberState::Primary => state.bright_green(),
        MemberState::Secondary => state.green(),
        MemberState::Down | MemberState::Removed | MemberState::Rollback => state.bright_red(),
        _ => state.yellow(),
    };
    let marker = if member.is_self { " (self)" } else { "" };
    println!("  [{}] {} {}{}", member.id, member.name, state, marker);
    if let Some(source) = &member.syncing_to {
        println!("      syncing from {}", source);
    }
    if !member.info_message.is_empty() {
        println!("      {}", member.info_message.dimmed());
    }
}

fn execute_plan(topology: Option<PathBuf>, settings: &ConnectionSettings) -> Result<()> {
    let membership = load_membership(topology, settings)?;
    membership.validate()?;

    let commands = [
        Command::Initiate(membership.initial_config()),
        Command::Reconfig(membership.target_config()),
        Command::GetStatus,
        Command::Ping,
    ];
    for command in &commands {
        println!("{}", format!("# {}", command.name()).bright_yellow());
        println!("{}", serde_json::to_string_pretty(command)?);
    }
    Ok(())
}

async fn execute_simulate(
    topology: Option<PathBuf>,
    settings: &ConnectionSettings,
    runs: u32,
    election_pending: bool,
    options: ConvergenceOptions,
) -> Result<()> {
    let membership = load_membership(topology, settings)?;
    let node = Arc::new(SimulatedNode::new(settings.host_port()));
    node.set_election_pending(election_pending);
    let converger = Converger::with_options(node.clone(), options);

    for run in 1..=runs {
        match converger.converge(&membership).await {
            Ok(converged) => println!(
                "{} run {}: converged (reconfigured: {}, primary: {})",
                "✓".bright_green(),
                run,
                converged.reconfigured,
                converged.primary.as_deref().unwrap_or("none")
            ),
            Err(ReplSetError::NotConverged(report)) => {
                println!("{} run {}: {}", "✗".bright_red(), run, report);
                return Err(anyhow!("replica set {} did not converge", membership.set_name));
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!("  Commands answered: {}", node.received().join(", ").dimmed());
    Ok(())
}
