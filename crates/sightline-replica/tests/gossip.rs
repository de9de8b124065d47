//! Anti-entropy between in-process replicas

use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use sightline_core::{
    Camera, CameraDto, ManualTimeSource, ObjectType, Observable, ObservableId, ObservableRef,
    Observation, ObservationDto, ReplicaId, Result, UpdateKey, UpdatePayload, UpdateRecord,
    VectorClock,
};
use sightline_replica::{
    LocalNetwork, MemoryRegistry, Registry, ReplicaApi, ReplicaConfig, ReplicaCoordinator,
    Versioned,
};
use sightline_replica::tcp::{read_frame, write_frame};
use sightline_store::LocalStore;

struct Cluster {
    registry: MemoryRegistry,
    network: LocalNetwork,
    time: ManualTimeSource,
    replicas: Vec<Arc<ReplicaCoordinator>>,
}

impl Cluster {
    async fn new(size: u32, peer_count: Option<usize>) -> Self {
        Self::build(size, |config| config.peer_count = peer_count).await
    }

    async fn build(size: u32, tweak: impl Fn(&mut ReplicaConfig)) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let registry = MemoryRegistry::new();
        let network = LocalNetwork::new();
        let time = ManualTimeSource::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let mut replicas = Vec::new();
        for id in 1..=size {
            let mut config = ReplicaConfig::for_replica(id);
            tweak(&mut config);
            let replica = Arc::new(
                ReplicaCoordinator::new(
                    config.clone(),
                    Arc::new(registry.clone()),
                    Arc::new(network.clone()),
                    Arc::new(time.clone()),
                )
                .unwrap(),
            );
            let address = format!("local:{id}");
            network.attach(address.clone(), replica.clone());
            registry
                .publish(&config.registry_path(), &address)
                .await
                .unwrap();
            replicas.push(replica);
        }
        Self {
            registry,
            network,
            time,
            replicas,
        }
    }

    fn replica(&self, id: usize) -> &Arc<ReplicaCoordinator> {
        &self.replicas[id - 1]
    }

    async fn gossip_everywhere(&self, rounds: usize) {
        for _ in 0..rounds {
            for replica in &self.replicas {
                replica.gossip_round().await;
            }
        }
    }
}

fn cameras_of(replica: &ReplicaCoordinator) -> BTreeSet<String> {
    replica.inspect(|store: &LocalStore| store.cameras().map(|c| c.name().to_string()).collect())
}

#[tokio::test]
async fn replicas_converge_after_gossip() {
    let cluster = Cluster::new(3, None).await;

    for (id, name) in [(1, "camOne"), (2, "camTwo"), (3, "camThree")] {
        let clock = cluster
            .replica(id)
            .cam_join(VectorClock::new(), CameraDto::new(name, 1.0, 1.0))
            .await
            .unwrap()
            .clock;
        cluster.time.advance_secs(1);
        cluster
            .replica(id)
            .report(clock, name.into(), vec![ObservableRef::person(id as u64)])
            .await
            .unwrap();
    }

    cluster.gossip_everywhere(2).await;

    let expected_clock = VectorClock::from(vec![2, 2, 2]);
    for replica in &cluster.replicas {
        assert_eq!(replica.clock(), expected_clock);
        assert_eq!(cameras_of(replica).len(), 3);
        assert_eq!(replica.inspect(LocalStore::observation_count), 3);
        assert_eq!(replica.update_count(), 6);
    }

    // Nothing left to exchange.
    let report = cluster.replica(1).gossip_round().await;
    assert_eq!(report.records_applied, 0);
}

#[tokio::test]
async fn updates_travel_through_intermediate_replicas() {
    let cluster = Cluster::new(3, None).await;
    let clock = cluster
        .replica(1)
        .cam_join(VectorClock::new(), CameraDto::new("relay", 0.0, 0.0))
        .await
        .unwrap()
        .clock;

    // Replica 1 drops off before replica 3 hears from it.
    cluster.replica(2).gossip_round().await;
    cluster.network.set_up("local:1", false);

    let clock = cluster
        .replica(2)
        .report(clock, "relay".into(), vec![ObservableRef::car("AABB10")])
        .await
        .unwrap();
    assert_eq!(clock.as_slice(), &[1, 1]);

    let report = cluster.replica(3).gossip_round().await;
    assert_eq!(report.peers_failed, 1);
    assert_eq!(report.records_applied, 2);

    let seen = cluster
        .replica(3)
        .track(VectorClock::new(), ObjectType::Car, ObservableId::Car("AABB10".into()))
        .await
        .unwrap();
    assert_eq!(seen.value.unwrap().camera.name, "relay");
    assert_eq!(seen.clock.as_slice(), &[1, 1, 0]);
}

#[tokio::test]
async fn fan_out_limits_peers_per_round() {
    let cluster = Cluster::new(4, Some(1)).await;
    let report = cluster.replica(1).gossip_round().await;
    assert_eq!(report.peers_contacted, 1);
}

#[tokio::test]
async fn unpublished_replicas_are_not_contacted() {
    let cluster = Cluster::new(3, None).await;
    cluster
        .registry
        .unpublish(&ReplicaConfig::for_replica(3).registry_path())
        .await
        .unwrap();

    let report = cluster.replica(1).gossip_round().await;
    assert_eq!(report.peers_contacted, 1);
}

#[tokio::test]
async fn conflicting_camera_does_not_block_later_updates() {
    let cluster = Cluster::new(2, None).await;
    let clock = cluster
        .replica(1)
        .cam_join(VectorClock::new(), CameraDto::new("dup", 10.0, 10.0))
        .await
        .unwrap()
        .clock;
    cluster
        .replica(1)
        .report(clock, "dup".into(), vec![ObservableRef::person(5)])
        .await
        .unwrap();
    cluster
        .replica(2)
        .cam_join(VectorClock::new(), CameraDto::new("dup", -10.0, -10.0))
        .await
        .unwrap();

    let report = cluster.replica(2).gossip_round().await;
    assert_eq!(report.records_applied, 1);
    assert_eq!(report.records_rejected, 1);
    assert_eq!(cluster.replica(2).clock().as_slice(), &[2, 1]);

    // The refused camera is not passed on to anyone else.
    let served = cluster
        .replica(2)
        .query_replica(VectorClock::new())
        .await
        .unwrap()
        .value;
    let cameras: Vec<_> = served
        .iter()
        .filter_map(|record| match &record.payload {
            UpdatePayload::Camera(camera) => Some((record.key.origin().get(), camera.latitude())),
            UpdatePayload::Observation(_) => None,
        })
        .collect();
    assert_eq!(cameras, [(2, -10.0)]);
    assert_eq!(served.len(), 2);

    let camera = cluster
        .replica(2)
        .cam_info(VectorClock::new(), "dup".into())
        .await
        .unwrap()
        .value;
    assert_eq!(camera.latitude, -10.0);
    assert_eq!(cluster.replica(2).inspect(LocalStore::observation_count), 1);
}

#[tokio::test]
async fn far_behind_peer_catches_up_in_bounded_batches() {
    let cluster = Cluster::build(2, |config| config.gossip_batch_limit = 4).await;
    let clock = cluster
        .replica(1)
        .cam_join(VectorClock::new(), CameraDto::new("bulk", 3.0, 3.0))
        .await
        .unwrap()
        .clock;
    let targets: Vec<_> = (1..=9).map(ObservableRef::person).collect();
    cluster
        .replica(1)
        .report(clock, "bulk".into(), targets)
        .await
        .unwrap();

    let behind = cluster.replica(2);
    let mut progress = Vec::new();
    for _ in 0..4 {
        let report = behind.gossip_round().await;
        assert_eq!(report.peers_failed, 0);
        assert!(report.records_received <= 4);
        progress.push(behind.clock().get(ReplicaId::new(1).unwrap()));
    }

    assert_eq!(progress, [4, 8, 10, 10]);
    assert_eq!(behind.inspect(LocalStore::observation_count), 9);
}

// =============================================================================
// Payloads decoded from the wire
// =============================================================================

/// Same field layout as an `UpdateRecord` carrying a camera, with none of
/// its checks
#[derive(Serialize)]
struct UncheckedRecord {
    key: (u32, Vec<u64>),
    payload: UncheckedPayload,
}

#[derive(Serialize)]
enum UncheckedPayload {
    Camera {
        name: String,
        latitude: f64,
        longitude: f64,
    },
}

async fn decode_record(record: &UncheckedRecord) -> Result<Option<UpdateRecord>> {
    let (mut tx, mut rx) = tokio::io::duplex(4096);
    write_frame(&mut tx, record).await.unwrap();
    read_frame(&mut rx).await
}

#[tokio::test]
async fn malformed_camera_never_survives_decoding() {
    let valid = UncheckedRecord {
        key: (1, vec![0]),
        payload: UncheckedPayload::Camera {
            name: "wirecam".into(),
            latitude: 10.0,
            longitude: 20.0,
        },
    };
    let decoded = decode_record(&valid).await.unwrap().unwrap();
    assert_matches!(decoded.payload, UpdatePayload::Camera(ref c) if c.name() == "wirecam");

    for (name, latitude, longitude) in [("x", 10.0, 20.0), ("wirecam", 500.0, -999.0)] {
        let forged = UncheckedRecord {
            key: (1, vec![0]),
            payload: UncheckedPayload::Camera {
                name: name.into(),
                latitude,
                longitude,
            },
        };
        assert!(decode_record(&forged).await.is_err(), "{name} at {latitude}");
    }
}

// =============================================================================
// Causal delivery against a scripted peer
// =============================================================================

/// Peer that answers `query_replica` with a fixed batch
struct ScriptedPeer {
    batch: Mutex<Vec<UpdateRecord>>,
    clock: VectorClock,
}

#[async_trait]
impl ReplicaApi for ScriptedPeer {
    async fn cam_join(&self, _: VectorClock, _: CameraDto) -> Result<Versioned<CameraDto>> {
        unimplemented!()
    }
    async fn cam_info(&self, _: VectorClock, _: String) -> Result<Versioned<CameraDto>> {
        unimplemented!()
    }
    async fn report(
        &self,
        _: VectorClock,
        _: String,
        _: Vec<ObservableRef>,
    ) -> Result<VectorClock> {
        unimplemented!()
    }
    async fn track(
        &self,
        _: VectorClock,
        _: ObjectType,
        _: ObservableId,
    ) -> Result<Versioned<Option<ObservationDto>>> {
        unimplemented!()
    }
    async fn track_match(
        &self,
        _: VectorClock,
        _: ObjectType,
        _: String,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        unimplemented!()
    }
    async fn trace(
        &self,
        _: VectorClock,
        _: ObjectType,
        _: ObservableId,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        unimplemented!()
    }
    async fn query_replica(&self, _: VectorClock) -> Result<Versioned<Vec<UpdateRecord>>> {
        Ok(Versioned::new(self.batch.lock().clone(), self.clock.clone()))
    }
    async fn ctrl_ping(&self, name: String) -> Result<String> {
        Ok(name)
    }
    async fn ctrl_clear(&self) -> Result<()> {
        Ok(())
    }
    async fn ctrl_init(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn records_behind_a_gap_wait_for_the_gap() {
    let cluster = Cluster::new(1, None).await;
    let origin = ReplicaId::new(2).unwrap();
    let camera = Camera::new("gapcam", 0.0, 0.0).unwrap();
    let camera_record = UpdateRecord::new(
        UpdateKey::new(origin, VectorClock::from(vec![0, 0])),
        UpdatePayload::Camera(camera.clone()),
    );
    let observation_record = UpdateRecord::new(
        UpdateKey::new(origin, VectorClock::from(vec![0, 1])),
        UpdatePayload::Observation(Observation::new(
            camera,
            Observable::person(77),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )),
    );

    let peer = Arc::new(ScriptedPeer {
        batch: Mutex::new(vec![observation_record.clone()]),
        clock: VectorClock::from(vec![0, 2]),
    });
    cluster.network.attach("local:2", peer.clone());
    cluster
        .registry
        .publish(&ReplicaConfig::for_replica(2).registry_path(), "local:2")
        .await
        .unwrap();

    let replica = cluster.replica(1);
    let report = replica.gossip_round().await;
    assert_eq!(report.records_dropped, 1);
    assert_eq!(report.records_applied, 0);
    assert_eq!(replica.clock().as_slice(), &[0, 0]);
    assert_eq!(replica.inspect(LocalStore::observation_count), 0);

    // The missing record arrives out of order alongside the one after it.
    *peer.batch.lock() = vec![observation_record, camera_record];
    let report = replica.gossip_round().await;
    assert_eq!(report.records_applied, 2);
    assert_eq!(replica.clock().as_slice(), &[0, 2]);
    assert_eq!(replica.inspect(LocalStore::observation_count), 1);

    // Redelivery is ignored.
    let report = replica.gossip_round().await;
    assert_eq!(report.records_applied, 0);
    assert_eq!(report.records_dropped, 2);
}
