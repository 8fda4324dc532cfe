use clap::Parser;
use colored::*;
use replset::cli::{Cli, DEFAULT_LOG_FILTER};
use replset::commands::execute_command;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // RUST_LOG wins unless --debug is given
    let filter = match cli.forced_log_filter() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    let settings = cli.connection.settings();
    if let Err(e) = execute_command(cli.command, settings, cli.verbose).await {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        process::exit(1);
    }
}
