//! Client session
//!
//! A session is bound to one replica at a time and remembers the newest
//! replica state it has observed as a vector clock. Every request carries
//! that clock; every answer's clock is merged back into it.
//!
//! # Guarantees
//!
//! - **Monotonic reads**: an answer whose clock does not dominate the
//!   observed clock is replaced by the cached answer to the same query, if
//!   there is one
//! - **Fail-over**: a transport failure rebinds the session to another
//!   replica from the registry and retries once; the camera this session
//!   registered (if any) is registered again on the new replica first

use std::future::Future;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sightline_core::{
    CameraDto, ObjectType, ObservableId, ObservableRef, ObservationDto, ReplicaId, Result,
    SightlineError, VectorClock,
};
use sightline_replica::{Connector, Registry, RegistryEntry, ReplicaApi, Versioned};

use crate::cache::{CachedResponse, QuerySignature, ResponseCache};

/// Retries after a transport failure, each against a newly bound replica
const MAX_FAILOVER_RETRIES: usize = 1;

fn default_registry_prefix() -> String {
    "sightline/replicas".to_string()
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Registry path under which replicas publish themselves
    #[serde(default = "default_registry_prefix")]
    pub registry_prefix: String,

    /// Replica to bind to; a random one when unset
    #[serde(default)]
    pub replica_id: Option<u32>,

    /// Read cache size; 0 disables caching
    #[serde(default)]
    pub cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            registry_prefix: default_registry_prefix(),
            replica_id: None,
            cache_capacity: 0,
        }
    }
}

struct Binding {
    entry: RegistryEntry,
    replica: Arc<dyn ReplicaApi>,
}

/// Client view of the replicated store
pub struct ClientSession {
    registry: Arc<dyn Registry>,
    connector: Arc<dyn Connector>,
    prefix: String,
    observed: VectorClock,
    cache: ResponseCache,
    binding: Binding,
    owned_camera: Option<CameraDto>,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("bound_to", &self.binding.entry.path)
            .field("observed", &self.observed)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    /// Bind to the configured replica, or to a random published one
    pub async fn connect(
        config: SessionConfig,
        registry: Arc<dyn Registry>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let prefix = config.registry_prefix.trim_end_matches('/').to_string();
        let (entry, clock_len) = match config.replica_id {
            Some(id) => {
                let id = ReplicaId::new(id)?;
                let path = format!("{prefix}/{id}");
                let address = registry.lookup(&path).await?;
                (RegistryEntry::new(path, address), id.slot() + 1)
            }
            None => {
                let entries = registry.list_children(&prefix).await?;
                let entry = entries
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .ok_or_else(|| {
                        SightlineError::unavailable(format!("no replica published under '{prefix}'"))
                    })?;
                let len = entry.replica_id()?.slot() + 1;
                (entry, len)
            }
        };

        let replica = connector.connect(&entry.address).await?;
        info!(replica = %entry.path, address = %entry.address, "Session bound");
        Ok(Self {
            registry,
            connector,
            prefix,
            observed: VectorClock::with_len(clock_len),
            cache: ResponseCache::new(config.cache_capacity),
            binding: Binding { entry, replica },
            owned_camera: None,
        })
    }

    /// Newest replica state this session has seen
    pub fn observed_clock(&self) -> &VectorClock {
        &self.observed
    }

    /// Registry path of the bound replica
    pub fn bound_path(&self) -> &str {
        &self.binding.entry.path
    }

    /// Read cache
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Register a camera and remember it as this session's own, so it is
    /// registered again after fail-over
    pub async fn cam_join(&mut self, camera: CameraDto) -> Result<CameraDto> {
        let request = camera.clone();
        let joined = self
            .invoke(move |replica, clock| {
                let camera = request.clone();
                async move { replica.cam_join(clock, camera).await }
            })
            .await?;
        self.observed.merge(&joined.clock);
        self.owned_camera = Some(camera);
        Ok(joined.value)
    }

    /// Report sightings by `camera`
    pub async fn report(&mut self, camera: &str, targets: Vec<ObservableRef>) -> Result<()> {
        let camera = camera.to_string();
        let clock = self
            .invoke(move |replica, clock| {
                let camera = camera.clone();
                let targets = targets.clone();
                async move { replica.report(clock, camera, targets).await }
            })
            .await?;
        self.observed.merge(&clock);
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Camera details
    pub async fn cam_info(&mut self, name: &str) -> Result<CameraDto> {
        let signature = QuerySignature::CamInfo(name.to_string());
        let owned = name.to_string();
        let result = self
            .invoke(move |replica, clock| {
                let name = owned.clone();
                async move {
                    replica
                        .cam_info(clock, name)
                        .await
                        .map(|v| Versioned::new(CachedResponse::Camera(v.value), v.clock))
                }
            })
            .await;

        match result {
            Ok(fresh) => self.settle(signature, fresh).into_camera(),
            Err(SightlineError::NotFound { message }) => match self.cache.get(&signature) {
                Some(cached) => {
                    debug!(camera = %name, "Replica lags behind; serving cached camera");
                    cached.clone().into_camera()
                }
                None => Err(SightlineError::NotFound { message }),
            },
            Err(e) => Err(e),
        }
    }

    /// Latest sighting of one object
    pub async fn track(
        &mut self,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Option<ObservationDto>> {
        let signature = QuerySignature::Track(object_type, id.clone());
        let fresh = self
            .invoke(move |replica, clock| {
                let id = id.clone();
                async move {
                    replica
                        .track(clock, object_type, id)
                        .await
                        .map(|v| Versioned::new(CachedResponse::Tracked(v.value), v.clock))
                }
            })
            .await?;
        self.settle(signature, fresh).into_tracked()
    }

    /// Latest sighting of every object matching `pattern`
    pub async fn track_match(
        &mut self,
        object_type: ObjectType,
        pattern: &str,
    ) -> Result<Vec<ObservationDto>> {
        let signature = QuerySignature::TrackMatch(object_type, pattern.to_string());
        let pattern = pattern.to_string();
        let fresh = self
            .invoke(move |replica, clock| {
                let pattern = pattern.clone();
                async move {
                    replica
                        .track_match(clock, object_type, pattern)
                        .await
                        .map(|v| Versioned::new(CachedResponse::Observations(v.value), v.clock))
                }
            })
            .await?;
        self.settle(signature, fresh).into_observations()
    }

    /// Every sighting of one object, newest first
    pub async fn trace(
        &mut self,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Vec<ObservationDto>> {
        let signature = QuerySignature::Trace(object_type, id.clone());
        let fresh = self
            .invoke(move |replica, clock| {
                let id = id.clone();
                async move {
                    replica
                        .trace(clock, object_type, id)
                        .await
                        .map(|v| Versioned::new(CachedResponse::Observations(v.value), v.clock))
                }
            })
            .await?;
        self.settle(signature, fresh).into_observations()
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Liveness check on the bound replica
    pub async fn ctrl_ping(&mut self, name: &str) -> Result<String> {
        let name = name.to_string();
        self.invoke(move |replica, _| {
            let name = name.clone();
            async move { replica.ctrl_ping(name).await }
        })
        .await
    }

    /// Wipe the bound replica
    pub async fn ctrl_clear(&mut self) -> Result<()> {
        self.invoke(|replica, _| async move { replica.ctrl_clear().await })
            .await
    }

    /// Wipe the bound replica and load the demo dataset
    pub async fn ctrl_init(&mut self) -> Result<()> {
        self.invoke(|replica, _| async move { replica.ctrl_init().await })
            .await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Accept a fresh answer or fall back to the cache
    fn settle(&mut self, signature: QuerySignature, fresh: Versioned<CachedResponse>) -> CachedResponse {
        if !fresh.clock.dominates(&self.observed) {
            if let Some(cached) = self.cache.get(&signature) {
                debug!(
                    observed = %self.observed,
                    returned = %fresh.clock,
                    "Stale answer; serving cached response"
                );
                return cached.clone();
            }
        }
        self.observed.merge(&fresh.clock);
        self.cache.insert(signature, fresh.value.clone());
        fresh.value
    }

    async fn invoke<T, F, Fut>(&mut self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn ReplicaApi>, VectorClock) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            let replica = self.binding.replica.clone();
            match op(replica, self.observed.clone()).await {
                Err(e) if e.is_transport() && retries < MAX_FAILOVER_RETRIES => {
                    retries += 1;
                    warn!(replica = %self.binding.entry.path, error = %e, "Replica unavailable; failing over");
                    self.rebind().await?;
                }
                result => return result,
            }
        }
    }

    /// Bind to a random published replica other than the current one and
    /// register the session's camera there
    async fn rebind(&mut self) -> Result<()> {
        let entries = self.registry.list_children(&self.prefix).await?;
        self.observed.align(entries.len());

        let current = &self.binding.entry.path;
        let candidates: Vec<_> = entries.iter().filter(|e| &e.path != current).collect();
        let entry = candidates
            .choose(&mut rand::thread_rng())
            .map(|e| (*e).clone())
            .ok_or_else(|| SightlineError::unavailable("no other replica to fail over to"))?;

        let replica = self.connector.connect(&entry.address).await?;
        info!(replica = %entry.path, "Session rebound");
        self.binding = Binding { entry, replica };

        if let Some(camera) = self.owned_camera.clone() {
            let name = camera.name.clone();
            match self
                .binding
                .replica
                .cam_join(self.observed.clone(), camera)
                .await
            {
                Ok(joined) => self.observed.merge(&joined.clock),
                Err(e) => warn!(camera = %name, error = %e, "Failed to re-register camera"),
            }
        }
        Ok(())
    }
}
