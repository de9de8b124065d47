//! Replica configuration
//!
//! Loaded from the `[replica]` table of the node's TOML file. Every field has
//! a default so a file only needs to name what differs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sightline_core::{ReplicaId, Result, SightlineError};

fn default_replica_id() -> u32 {
    1
}

fn default_bind_address() -> String {
    "127.0.0.1:8081".to_string()
}

fn default_registry_prefix() -> String {
    "sightline/replicas".to_string()
}

fn default_gossip_interval_secs() -> u64 {
    30
}

fn default_gossip_batch_limit() -> usize {
    4096
}

/// What `ctrl_clear` does with the vector clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Keep the clock; only the store and update logs are wiped
    #[default]
    PreserveClock,
    /// Zero the clock along with the store and logs
    ResetClock,
}

/// Replica configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// 1-based replica id, also the last segment of the registry path
    #[serde(default = "default_replica_id")]
    pub replica_id: u32,

    /// Address the RPC server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Registry path under which replicas publish themselves
    #[serde(default = "default_registry_prefix")]
    pub registry_prefix: String,

    /// Seconds between gossip rounds
    #[serde(default = "default_gossip_interval_secs")]
    pub gossip_interval_secs: u64,

    /// Peers contacted per round; all of them when unset
    #[serde(default)]
    pub peer_count: Option<usize>,

    /// Per-call timeout for gossip requests, in milliseconds
    #[serde(default)]
    pub rpc_timeout_ms: Option<u64>,

    /// Most update records served in one `query_replica` answer. A peer
    /// further behind catches up over several rounds.
    #[serde(default = "default_gossip_batch_limit")]
    pub gossip_batch_limit: usize,

    /// Clock handling on `ctrl_clear`
    #[serde(default)]
    pub clear_policy: ClearPolicy,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            replica_id: default_replica_id(),
            bind_address: default_bind_address(),
            registry_prefix: default_registry_prefix(),
            gossip_interval_secs: default_gossip_interval_secs(),
            peer_count: None,
            rpc_timeout_ms: None,
            gossip_batch_limit: default_gossip_batch_limit(),
            clear_policy: ClearPolicy::default(),
        }
    }
}

impl ReplicaConfig {
    /// Default configuration for replica `id`
    pub fn for_replica(id: u32) -> Self {
        Self {
            replica_id: id,
            ..Self::default()
        }
    }

    /// Check ranges and required fields
    pub fn validate(&self) -> Result<()> {
        ReplicaId::new(self.replica_id)?;
        if self.bind_address.trim().is_empty() {
            return Err(SightlineError::invalid_argument("bind_address must not be blank"));
        }
        if self.registry_prefix.trim_matches('/').is_empty() {
            return Err(SightlineError::invalid_argument(
                "registry_prefix must not be blank",
            ));
        }
        if self.gossip_interval_secs == 0 {
            return Err(SightlineError::invalid_argument(
                "gossip_interval_secs must be positive",
            ));
        }
        if self.peer_count == Some(0) {
            return Err(SightlineError::invalid_argument(
                "peer_count must be positive when set",
            ));
        }
        if self.gossip_batch_limit == 0 {
            return Err(SightlineError::invalid_argument(
                "gossip_batch_limit must be positive",
            ));
        }
        Ok(())
    }

    /// Validated replica id
    pub fn id(&self) -> Result<ReplicaId> {
        ReplicaId::new(self.replica_id)
    }

    /// Registry path of this replica: `<prefix>/<id>`
    pub fn registry_path(&self) -> String {
        format!("{}/{}", self.registry_prefix.trim_end_matches('/'), self.replica_id)
    }

    /// Gossip period
    pub fn gossip_interval(&self) -> Duration {
        Duration::from_secs(self.gossip_interval_secs)
    }

    /// Gossip request timeout, if any
    pub fn rpc_timeout(&self) -> Option<Duration> {
        self.rpc_timeout_ms.map(Duration::from_millis)
    }
}
