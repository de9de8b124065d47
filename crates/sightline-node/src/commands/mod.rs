//! Subcommand handlers

pub mod ctrl;
pub mod query;
pub mod replica;

use std::sync::Arc;

use anyhow::Result;
use sightline_client::{ClientSession, SessionConfig};
use sightline_replica::{FileRegistry, TcpConnector};

use crate::config::NodeConfig;

/// Open a client session using the node's registry directory
pub async fn open_session(config: &NodeConfig, replica_id: Option<u32>) -> Result<ClientSession> {
    let session_config = SessionConfig {
        replica_id: replica_id.or(config.client.replica_id),
        ..config.client.clone()
    };
    let registry = FileRegistry::open(&config.registry_dir).await?;
    let connector = TcpConnector::new(config.replica.rpc_timeout());
    Ok(ClientSession::connect(session_config, Arc::new(registry), Arc::new(connector)).await?)
}
