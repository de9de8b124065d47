//! Sightline node
//!
//! Runs a replica of the Sightline camera-sighting store, or issues control
//! and query commands to running replicas found through the shared registry
//! directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use commands::{
    ctrl::{handle_ctrl_command, CtrlCommand},
    query::{handle_query_command, QueryCommand},
    replica::{handle_replica_command, ReplicaCommand},
};

#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Sightline - replicated camera sighting store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "sightline.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a replica until Ctrl+C
    Replica(ReplicaCommand),

    /// Control operations (ping, clear, init)
    Ctrl(CtrlCommand),

    /// Read operations through a client session
    Query(QueryCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Replica(cmd) => handle_replica_command(cmd, &config).await?,
        Commands::Ctrl(cmd) => handle_ctrl_command(cmd, &config).await?,
        Commands::Query(cmd) => handle_query_command(cmd, &config).await?,
    }

    Ok(())
}
