//! # Sightline Replica
//!
//! A replica of the Sightline store: the operation engine wrapped with
//! vector-clock bookkeeping, an append-only update log, and periodic gossip
//! with peers found through a registry.
//!
//! ## Architecture
//!
//! - [`ReplicaCoordinator`]: request handling, causal delivery, lifecycle
//! - [`ReplicaApi`]: the RPC seam, implemented by the coordinator and by
//!   remote handles
//! - [`Registry`]: name service ([`MemoryRegistry`], [`FileRegistry`])
//! - [`Connector`]: address to handle ([`LocalNetwork`], [`TcpConnector`])
//! - [`TcpReplicaServer`]: serves a replica over length-prefixed frames
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sightline_core::SystemTimeSource;
//! use sightline_replica::{MemoryRegistry, ReplicaConfig, ReplicaCoordinator, TcpConnector};
//!
//! # async fn example() -> sightline_core::Result<()> {
//! let replica = Arc::new(ReplicaCoordinator::new(
//!     ReplicaConfig::for_replica(1),
//!     Arc::new(MemoryRegistry::new()),
//!     Arc::new(TcpConnector::default()),
//!     Arc::new(SystemTimeSource),
//! )?);
//! replica.start("127.0.0.1:8081").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod coordinator;
pub mod gossip;
pub mod log;
pub mod network;
pub mod registry;
pub mod tasks;
pub mod tcp;

pub use api::{dispatch, RemoteReplica, ReplicaApi, RpcChannel, RpcRequest, RpcResponse, Versioned};
pub use config::{ClearPolicy, ReplicaConfig};
pub use coordinator::ReplicaCoordinator;
pub use gossip::GossipReport;
pub use log::UpdateLog;
pub use network::{Connector, LocalNetwork};
pub use registry::{FileRegistry, MemoryRegistry, Registry, RegistryEntry};
pub use tasks::TaskRegistry;
pub use tcp::{TcpChannel, TcpConnector, TcpReplicaServer};
