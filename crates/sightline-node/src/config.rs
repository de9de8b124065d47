//! Node configuration file
//!
//! ```toml
//! registry_dir = ".sightline/registry"
//!
//! [replica]
//! replica_id = 2
//! bind_address = "127.0.0.1:8082"
//! gossip_interval_secs = 30
//! clear_policy = "preserve_clock"
//!
//! [client]
//! cache_capacity = 64
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use sightline_client::SessionConfig;
use sightline_replica::ReplicaConfig;

fn default_registry_dir() -> PathBuf {
    PathBuf::from(".sightline/registry")
}

/// Everything a node process reads from its TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory shared by every process for replica discovery
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,

    /// Replica settings used by `sightline replica`
    #[serde(default)]
    pub replica: ReplicaConfig,

    /// Session settings used by client commands
    #[serde(default)]
    pub client: SessionConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            registry_dir: default_registry_dir(),
            replica: ReplicaConfig::default(),
            client: SessionConfig::default(),
        }
    }
}

/// Load `path`, falling back to defaults when the file does not exist
pub fn load_config(path: &Path) -> Result<NodeConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No config file; using defaults");
        return Ok(NodeConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}
