use crate::config::ConnectionSettings;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

/// replset - replica-set status inspection and membership convergence
#[derive(Parser)]
#[command(name = "replset")]
#[command(version)]
#[command(about = "Inspect replica-set status snapshots and converge membership to a target topology")]
#[command(long_about = "
replset models the status reported by replSetGetStatus and drives a replica
set's membership configuration to a desired topology, treating the expected
'already initialized' and 'version must be greater' replies as success paths.

Usage examples:
  replset status status.json --state secondary
  replset plan topology.toml
  replset simulate topology.toml --runs 2
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Log filter used when neither RUST_LOG nor --debug is given
pub const DEFAULT_LOG_FILTER: &str = "info";

impl Cli {
    /// Filter forced by flags; `None` defers to RUST_LOG
    pub fn forced_log_filter(&self) -> Option<&'static str> {
        if self.debug {
            Some("debug")
        } else {
            None
        }
    }
}

/// Parameters for reaching the node
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Node host name
    #[arg(long, global = true, default_value = "localhost")]
    pub host: String,

    /// Node port
    #[arg(long, global = true, default_value_t = 27017)]
    pub port: u16,

    /// User name
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Database the final liveness ping runs against
    #[arg(long, global = true, default_value = "admin")]
    pub database: String,

    /// Replica-set name
    #[arg(long = "set", global = true, default_value = "rs0")]
    pub replica_set: String,
}

impl ConnectionArgs {
    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            replica_set: self.replica_set.clone(),
        }
    }
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Summarize a saved replSetGetStatus reply
    Status {
        /// JSON file holding the reply
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the canonical JSON form instead of a summary
        #[arg(long)]
        json: bool,

        /// Show a single member by name (host:port)
        #[arg(short, long)]
        member: Option<String>,

        /// List members in this state (e.g. PRIMARY, secondary)
        #[arg(short, long)]
        state: Option<String>,

        /// Maximum members to list with --state; 0 lists all
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        limit: i64,
    },

    /// Print the command documents convergence would send
    Plan {
        /// TOML topology file; defaults to a single member built from --host/--port/--set
        #[arg(value_name = "TOPOLOGY")]
        topology: Option<PathBuf>,
    },

    /// Run the convergence procedure against an in-process node
    Simulate {
        /// TOML topology file; defaults to a single member built from --host/--port/--set
        #[arg(value_name = "TOPOLOGY")]
        topology: Option<PathBuf>,

        /// Number of consecutive convergence runs
        #[arg(short, long, default_value_t = 2)]
        runs: u32,

        /// Keep the node secondary so only the reconfigure can carry the verdict
        #[arg(long)]
        election_pending: bool,

        /// Deadline for each run, in seconds
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,

        /// Also require every target host in the final status
        #[arg(long)]
        verify_members: bool,
    },
}

pub fn print_banner(settings: &ConnectionSettings) {
    println!("{}", "replset".bright_yellow().bold());
    println!("  Version: {}", env!("CARGO_PKG_VERSION").bright_green());
    println!("  Target: {}", settings.redacted_uri().bright_green());
    println!("  Set: {}", settings.replica_set.bright_green());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["replset", "status", "status.json", "--state", "secondary", "--limit", "2"]);
        match cli.command {
            Commands::Status { file, state, limit, json, .. } => {
                assert_eq!(file, PathBuf::from("status.json"));
                assert_eq!(state.as_deref(), Some("secondary"));
                assert_eq!(limit, 2);
                assert!(!json);
            }
            _ => panic!("Expected Status command"),
        }

        let cli = Cli::parse_from(["replset", "simulate", "--runs", "3", "--set", "rs9", "--port", "27018"]);
        match cli.command {
            Commands::Simulate { topology, runs, timeout, .. } => {
                assert!(topology.is_none());
                assert_eq!(runs, 3);
                assert_eq!(timeout, 10);
            }
            _ => panic!("Expected Simulate command"),
        }
        let settings = cli.connection.settings();
        assert_eq!(settings.replica_set, "rs9");
        assert_eq!(settings.host_port(), "localhost:27018");
    }

    #[test]
    fn test_log_filter_selection() {
        assert_eq!(DEFAULT_LOG_FILTER, "info");

        let cli = Cli::parse_from(["replset", "plan"]);
        assert_eq!(cli.forced_log_filter(), None);

        let cli = Cli::parse_from(["replset", "plan", "-d", "--database", "inventory"]);
        assert_eq!(cli.forced_log_filter(), Some("debug"));
        assert_eq!(cli.connection.settings().database, "inventory");
    }

    #[test]
    fn test_negative_limit_is_accepted() {
        let cli = Cli::parse_from(["replset", "status", "s.json", "--state", "primary", "--limit", "-1"]);
        assert!(matches!(cli.command, Commands::Status { limit: -1, .. }));
    }
}
