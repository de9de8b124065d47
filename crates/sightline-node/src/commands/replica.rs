//! `sightline replica`: run one replica until Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use sightline_core::SystemTimeSource;
use sightline_replica::{FileRegistry, ReplicaCoordinator, TcpConnector, TcpReplicaServer};

use crate::config::NodeConfig;

/// Replica command options; each flag overrides the config file
#[derive(Args, Debug)]
pub struct ReplicaCommand {
    /// Replica id (1-based)
    #[arg(short, long)]
    pub id: Option<u32>,

    /// Address to listen on
    #[arg(long)]
    pub bind: Option<String>,

    /// Address published in the registry, when it differs from the bound one
    #[arg(long)]
    pub advertise: Option<String>,

    /// Seconds between gossip rounds
    #[arg(long)]
    pub gossip_interval_secs: Option<u64>,

    /// Peers contacted per gossip round
    #[arg(long)]
    pub peer_count: Option<usize>,
}

/// Run a replica with `config` and the command's overrides
pub async fn handle_replica_command(cmd: ReplicaCommand, config: &NodeConfig) -> Result<()> {
    let mut replica_config = config.replica.clone();
    if let Some(id) = cmd.id {
        replica_config.replica_id = id;
    }
    if let Some(bind) = cmd.bind {
        replica_config.bind_address = bind;
    }
    if let Some(secs) = cmd.gossip_interval_secs {
        replica_config.gossip_interval_secs = secs;
    }
    if cmd.peer_count.is_some() {
        replica_config.peer_count = cmd.peer_count;
    }
    replica_config.validate().context("invalid replica configuration")?;

    let registry = FileRegistry::open(&config.registry_dir)
        .await
        .with_context(|| format!("opening registry {}", config.registry_dir.display()))?;
    let connector = TcpConnector::new(replica_config.rpc_timeout());
    let replica = Arc::new(ReplicaCoordinator::new(
        replica_config.clone(),
        Arc::new(registry),
        Arc::new(connector),
        Arc::new(SystemTimeSource),
    )?);

    let server = TcpReplicaServer::bind(&replica_config.bind_address, replica.clone())
        .await
        .with_context(|| format!("binding {}", replica_config.bind_address))?;
    let address = match cmd.advertise {
        Some(address) => address,
        None => server.local_addr()?.to_string(),
    };
    let server_task = tokio::spawn(server.serve());

    replica.start(&address).await?;
    info!(
        replica = %replica.id(),
        address = %address,
        interval_secs = replica_config.gossip_interval_secs,
        "Replica running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping replica...");

    replica.shutdown().await?;
    server_task.abort();
    Ok(())
}
