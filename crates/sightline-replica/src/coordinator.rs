//! Replica coordinator
//!
//! Wraps the operation engine with causal bookkeeping and runs the gossip
//! loop.
//!
//! # Architecture
//!
//! All mutable replica state (store, vector clock, update logs) lives in one
//! [`ReplicaState`] behind a single `parking_lot::RwLock`:
//! - client reads take the read lock and answer with a clock snapshot
//! - client writes and gossip delivery take the write lock
//! - registry lookups and peer RPCs run with no lock held
//!
//! # Write path
//!
//! The causal prefix of a client write is the caller's clock with this
//! replica's slot replaced by the replica's own counter. Each object the
//! write produces is logged under `(self, prefix)` and then both the prefix
//! and the clock advance one step in this replica's slot, so a write of `n`
//! objects occupies `n` consecutive positions in the replica's sequence.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use sightline_core::{
    CameraDto, ObjectType, ObservableId, ObservableRef, ObservationDto, ReplicaId, Result,
    SightlineError, TimeSource, UpdateKey, UpdatePayload, UpdateRecord, VectorClock,
};
use sightline_store::convert::observation_dtos;
use sightline_store::{LocalStore, OperationEngine};

use crate::api::{ReplicaApi, Versioned};
use crate::config::{ClearPolicy, ReplicaConfig};
use crate::gossip::{choose_peers, deliver, GossipReport};
use crate::log::UpdateLog;
use crate::network::Connector;
use crate::registry::{Registry, RegistryEntry};
use crate::tasks::TaskRegistry;

/// Everything guarded by the replica lock
#[derive(Debug)]
pub(crate) struct ReplicaState {
    pub(crate) engine: OperationEngine,
    pub(crate) clock: VectorClock,
    pub(crate) log: UpdateLog,
}

/// One replica: state, RPC handlers and gossip
pub struct ReplicaCoordinator {
    id: ReplicaId,
    config: ReplicaConfig,
    state: RwLock<ReplicaState>,
    registry: Arc<dyn Registry>,
    connector: Arc<dyn Connector>,
    tasks: TaskRegistry,
    published: Mutex<bool>,
}

impl fmt::Debug for ReplicaCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaCoordinator")
            .field("id", &self.id)
            .field("clock", &self.clock())
            .finish_non_exhaustive()
    }
}

impl ReplicaCoordinator {
    /// Build a replica with an empty store. Nothing runs until
    /// [`Self::start`].
    pub fn new(
        config: ReplicaConfig,
        registry: Arc<dyn Registry>,
        connector: Arc<dyn Connector>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        config.validate()?;
        let id = config.id()?;
        let state = ReplicaState {
            engine: OperationEngine::new(time),
            clock: VectorClock::with_len(id.slot() + 1),
            log: UpdateLog::new(),
        };
        Ok(Self {
            id,
            config,
            state: RwLock::new(state),
            registry,
            connector,
            tasks: TaskRegistry::new(),
            published: Mutex::new(false),
        })
    }

    /// This replica's id
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    /// Active configuration
    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// Snapshot of the vector clock
    pub fn clock(&self) -> VectorClock {
        self.state.read().clock.clone()
    }

    /// Number of logged updates
    pub fn update_count(&self) -> usize {
        self.state.read().log.len()
    }

    /// Run `f` against the store under the read lock
    pub fn inspect<R>(&self, f: impl FnOnce(&LocalStore) -> R) -> R {
        f(self.state.read().engine.store())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Publish `address` under this replica's registry path and start the
    /// periodic gossip task. The first round runs immediately.
    pub async fn start(self: &Arc<Self>, address: &str) -> Result<()> {
        let path = self.config.registry_path();
        self.registry.publish(&path, address).await?;
        *self.published.lock() = true;
        info!(replica = %self.id, path = %path, address = %address, "Replica published");

        let weak: Weak<Self> = Arc::downgrade(self);
        self.tasks
            .spawn_interval_until(self.config.gossip_interval(), move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(replica) => {
                            replica.gossip_round().await;
                            true
                        }
                        None => false,
                    }
                }
            });
        Ok(())
    }

    /// Stop background tasks and remove the registry entry
    pub async fn shutdown(&self) -> Result<()> {
        self.tasks.shutdown();
        let was_published = std::mem::replace(&mut *self.published.lock(), false);
        if was_published {
            self.registry
                .unpublish(&self.config.registry_path())
                .await?;
            info!(replica = %self.id, "Replica unpublished");
        }
        Ok(())
    }

    // =========================================================================
    // Gossip
    // =========================================================================

    /// Pull missing updates from up to `peer_count` random peers and deliver
    /// them causally
    pub async fn gossip_round(&self) -> GossipReport {
        let mut report = GossipReport::default();

        let peers = match self.select_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                warn!(replica = %self.id, error = %e, "Failed to list peers");
                return report;
            }
        };

        for peer in peers {
            report.peers_contacted += 1;
            let clock = self.clock();
            let response = match self.fetch_updates(&peer, clock).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(replica = %self.id, peer = %peer.path, error = %e, "Gossip with peer failed");
                    report.peers_failed += 1;
                    continue;
                }
            };

            report.records_received += response.value.len();
            let delivery = {
                let mut state = self.state.write();
                deliver(&mut state, response.value, &response.clock)
            };
            report.records_applied += delivery.applied;
            report.records_dropped += delivery.dropped;
            report.records_rejected += delivery.rejected;
            debug!(
                replica = %self.id,
                peer = %peer.path,
                applied = delivery.applied,
                dropped = delivery.dropped,
                rejected = delivery.rejected,
                "Exchanged updates"
            );
        }

        info!(
            replica = %self.id,
            clock = %self.clock(),
            peers = report.peers_contacted,
            applied = report.records_applied,
            "Gossip round complete"
        );
        report
    }

    async fn select_peers(&self) -> Result<Vec<RegistryEntry>> {
        let entries = self
            .registry
            .list_children(&self.config.registry_prefix)
            .await?;
        Ok(choose_peers(
            entries,
            &self.config.registry_path(),
            self.config.peer_count,
            &mut rand::thread_rng(),
        ))
    }

    async fn fetch_updates(
        &self,
        peer: &RegistryEntry,
        clock: VectorClock,
    ) -> Result<Versioned<Vec<UpdateRecord>>> {
        let replica = self.connector.connect(&peer.address).await?;
        let call = replica.query_replica(clock);
        match self.config.rpc_timeout() {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                SightlineError::unavailable(format!("{} timed out after {limit:?}", peer.path))
            })?,
            None => call.await,
        }
    }

    // =========================================================================
    // Request handling
    // =========================================================================

    fn write<T>(
        &self,
        caller: &VectorClock,
        op: impl FnOnce(&mut OperationEngine) -> Result<(T, Vec<UpdatePayload>)>,
    ) -> Result<(T, VectorClock)> {
        let mut state = self.state.write();
        let mut prefix = caller.clone();
        prefix.set(self.id, state.clock.get(self.id));

        let (value, payloads) = op(&mut state.engine)?;
        for payload in payloads {
            state
                .log
                .append(UpdateKey::new(self.id, prefix.clone()), payload);
            prefix.advance(self.id);
            state.clock.advance(self.id);
        }
        Ok((value, state.clock.clone()))
    }

    fn read<T>(&self, op: impl FnOnce(&OperationEngine) -> Result<T>) -> Result<Versioned<T>> {
        let state = self.state.read();
        let value = op(&state.engine)?;
        Ok(Versioned::new(value, state.clock.clone()))
    }

    fn clear_locked(&self, state: &mut ReplicaState) {
        state.engine.clear();
        state.log.clear();
        if self.config.clear_policy == ClearPolicy::ResetClock {
            state.clock = VectorClock::with_len(self.id.slot() + 1);
        }
    }
}

#[async_trait]
impl ReplicaApi for ReplicaCoordinator {
    async fn cam_join(
        &self,
        clock: VectorClock,
        camera: CameraDto,
    ) -> Result<Versioned<CameraDto>> {
        let (joined, clock) = self.write(&clock, |engine| {
            let camera = engine.cam_join(&camera)?;
            Ok((CameraDto::from(&camera), vec![UpdatePayload::Camera(camera)]))
        })?;
        info!(replica = %self.id, camera = %joined.name, clock = %clock, "Camera joined");
        Ok(Versioned::new(joined, clock))
    }

    async fn cam_info(&self, _clock: VectorClock, name: String) -> Result<Versioned<CameraDto>> {
        self.read(|engine| engine.cam_info(&name).map(|camera| CameraDto::from(&camera)))
    }

    async fn report(
        &self,
        clock: VectorClock,
        camera: String,
        targets: Vec<ObservableRef>,
    ) -> Result<VectorClock> {
        let (count, clock) = self.write(&clock, |engine| {
            let stored = engine.report(&camera, &targets)?;
            let count = stored.len();
            Ok((count, stored.into_iter().map(UpdatePayload::Observation).collect()))
        })?;
        info!(replica = %self.id, camera = %camera, count, clock = %clock, "Report stored");
        Ok(clock)
    }

    async fn track(
        &self,
        _clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Option<ObservationDto>>> {
        self.read(|engine| {
            engine
                .track(object_type, &id)?
                .as_ref()
                .map(ObservationDto::try_from)
                .transpose()
        })
    }

    async fn track_match(
        &self,
        _clock: VectorClock,
        object_type: ObjectType,
        pattern: String,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        self.read(|engine| observation_dtos(&engine.track_match(object_type, &pattern)?))
    }

    async fn trace(
        &self,
        _clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        self.read(|engine| observation_dtos(&engine.trace(object_type, &id)?))
    }

    async fn query_replica(&self, clock: VectorClock) -> Result<Versioned<Vec<UpdateRecord>>> {
        let state = self.state.read();
        let records = state.log.missing_from(&clock, self.config.gossip_batch_limit);
        debug!(replica = %self.id, requester = %clock, count = records.len(), "Serving updates");
        Ok(Versioned::new(records, state.clock.clone()))
    }

    async fn ctrl_ping(&self, name: String) -> Result<String> {
        self.state.read().engine.ping(&name)
    }

    async fn ctrl_clear(&self) -> Result<()> {
        let mut state = self.state.write();
        self.clear_locked(&mut state);
        info!(replica = %self.id, policy = ?self.config.clear_policy, clock = %state.clock, "Replica cleared");
        Ok(())
    }

    async fn ctrl_init(&self) -> Result<()> {
        let mut state = self.state.write();
        self.clear_locked(&mut state);
        state.engine.populate_demo()?;
        info!(
            replica = %self.id,
            cameras = state.engine.store().camera_count(),
            observations = state.engine.store().observation_count(),
            "Demo dataset loaded"
        );
        Ok(())
    }
}
