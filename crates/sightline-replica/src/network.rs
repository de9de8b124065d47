//! Connecting to replicas by address
//!
//! A [`Connector`] turns a registry address into a [`ReplicaApi`] handle.
//! [`LocalNetwork`] keeps every replica in-process and can take endpoints
//! down to simulate crashes and partitions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use sightline_core::{
    CameraDto, ObjectType, ObservableId, ObservableRef, ObservationDto, Result, SightlineError,
    UpdateRecord, VectorClock,
};

use crate::api::{ReplicaApi, Versioned};

/// Opens handles to replicas
#[async_trait]
pub trait Connector: Send + Sync {
    /// Handle to the replica at `address`
    async fn connect(&self, address: &str) -> Result<Arc<dyn ReplicaApi>>;
}

struct Endpoint {
    replica: Arc<dyn ReplicaApi>,
    up: bool,
}

/// In-process network of replicas. Clones share the same endpoints.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    endpoints: Arc<RwLock<HashMap<String, Endpoint>>>,
}

impl std::fmt::Debug for LocalNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoints = self.endpoints.read();
        let mut addresses: Vec<_> = endpoints.keys().collect();
        addresses.sort();
        f.debug_struct("LocalNetwork")
            .field("endpoints", &addresses)
            .finish()
    }
}

impl LocalNetwork {
    /// Empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `replica` at `address`, replacing any previous endpoint
    pub fn attach(&self, address: impl Into<String>, replica: Arc<dyn ReplicaApi>) {
        self.endpoints
            .write()
            .insert(address.into(), Endpoint { replica, up: true });
    }

    /// Remove the endpoint at `address`
    pub fn detach(&self, address: &str) {
        self.endpoints.write().remove(address);
    }

    /// Mark the endpoint reachable or not. Existing handles observe the
    /// change on their next call.
    pub fn set_up(&self, address: &str, up: bool) {
        if let Some(endpoint) = self.endpoints.write().get_mut(address) {
            endpoint.up = up;
        }
    }

    fn resolve(&self, address: &str) -> Result<Arc<dyn ReplicaApi>> {
        match self.endpoints.read().get(address) {
            Some(endpoint) if endpoint.up => Ok(endpoint.replica.clone()),
            Some(_) => Err(SightlineError::unavailable(format!("{address} is down"))),
            None => Err(SightlineError::unavailable(format!("nothing listens on {address}"))),
        }
    }
}

#[async_trait]
impl Connector for LocalNetwork {
    async fn connect(&self, address: &str) -> Result<Arc<dyn ReplicaApi>> {
        self.resolve(address)?;
        Ok(Arc::new(LocalLink {
            network: self.clone(),
            address: address.to_string(),
        }))
    }
}

/// Handle that resolves its endpoint on every call
#[derive(Debug)]
struct LocalLink {
    network: LocalNetwork,
    address: String,
}

impl LocalLink {
    fn target(&self) -> Result<Arc<dyn ReplicaApi>> {
        self.network.resolve(&self.address)
    }
}

#[async_trait]
impl ReplicaApi for LocalLink {
    async fn cam_join(
        &self,
        clock: VectorClock,
        camera: CameraDto,
    ) -> Result<Versioned<CameraDto>> {
        self.target()?.cam_join(clock, camera).await
    }

    async fn cam_info(&self, clock: VectorClock, name: String) -> Result<Versioned<CameraDto>> {
        self.target()?.cam_info(clock, name).await
    }

    async fn report(
        &self,
        clock: VectorClock,
        camera: String,
        targets: Vec<ObservableRef>,
    ) -> Result<VectorClock> {
        self.target()?.report(clock, camera, targets).await
    }

    async fn track(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Option<ObservationDto>>> {
        self.target()?.track(clock, object_type, id).await
    }

    async fn track_match(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        pattern: String,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        self.target()?.track_match(clock, object_type, pattern).await
    }

    async fn trace(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        self.target()?.trace(clock, object_type, id).await
    }

    async fn query_replica(&self, clock: VectorClock) -> Result<Versioned<Vec<UpdateRecord>>> {
        self.target()?.query_replica(clock).await
    }

    async fn ctrl_ping(&self, name: String) -> Result<String> {
        self.target()?.ctrl_ping(name).await
    }

    async fn ctrl_clear(&self) -> Result<()> {
        self.target()?.ctrl_clear().await
    }

    async fn ctrl_init(&self) -> Result<()> {
        self.target()?.ctrl_init().await
    }
}
