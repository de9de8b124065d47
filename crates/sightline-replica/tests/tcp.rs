//! Replicas talking over real sockets with a file registry

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use sightline_core::{
    CameraDto, ObjectType, ObservableId, ObservableRef, SightlineError, SystemTimeSource,
    VectorClock,
};
use sightline_replica::{
    Connector, FileRegistry, Registry, ReplicaApi, ReplicaConfig, ReplicaCoordinator,
    TcpConnector, TcpReplicaServer,
};

async fn spawn_replica(id: u32, registry: &FileRegistry) -> (Arc<ReplicaCoordinator>, String) {
    let config = ReplicaConfig {
        bind_address: "127.0.0.1:0".into(),
        gossip_interval_secs: 3_600,
        rpc_timeout_ms: Some(2_000),
        ..ReplicaConfig::for_replica(id)
    };
    let replica = Arc::new(
        ReplicaCoordinator::new(
            config.clone(),
            Arc::new(registry.clone()),
            Arc::new(TcpConnector::new(config.rpc_timeout())),
            Arc::new(SystemTimeSource),
        )
        .unwrap(),
    );
    let server = TcpReplicaServer::bind(&config.bind_address, replica.clone())
        .await
        .unwrap();
    let address = server.local_addr().unwrap().to_string();
    tokio::spawn(server.serve());
    (replica, address)
}

#[tokio::test]
async fn requests_and_errors_cross_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FileRegistry::open(dir.path()).await.unwrap();
    let (_replica, address) = spawn_replica(1, &registry).await;

    let remote = TcpConnector::new(Some(Duration::from_secs(2)))
        .connect(&address)
        .await
        .unwrap();

    assert_eq!(remote.ctrl_ping("wire".into()).await.unwrap(), "Hello wire!");

    let joined = remote
        .cam_join(VectorClock::new(), CameraDto::new("wirecam", 38.7, -9.3))
        .await
        .unwrap();
    assert_eq!(joined.value.name, "wirecam");
    assert_eq!(joined.clock.as_slice(), &[1]);

    remote
        .report(joined.clock, "wirecam".into(), vec![ObservableRef::person(12)])
        .await
        .unwrap();
    let tracked = remote
        .track(VectorClock::new(), ObjectType::Person, ObservableId::Person(12))
        .await
        .unwrap();
    assert_eq!(tracked.value.unwrap().camera.name, "wirecam");

    assert_matches!(
        remote.cam_info(VectorClock::new(), "nowhere".into()).await,
        Err(SightlineError::NotFound { .. })
    );
}

#[tokio::test]
async fn replicas_discover_each_other_through_the_registry_directory() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FileRegistry::open(dir.path()).await.unwrap();
    let (first, first_address) = spawn_replica(1, &registry).await;
    let (second, second_address) = spawn_replica(2, &registry).await;
    first.start(&first_address).await.unwrap();
    second.start(&second_address).await.unwrap();

    let children = registry.list_children("sightline/replicas").await.unwrap();
    assert_eq!(children.len(), 2);

    first
        .cam_join(VectorClock::new(), CameraDto::new("shared", 1.0, 2.0))
        .await
        .unwrap();

    // The background task may already have pulled the update; either way a
    // round against a live peer succeeds and leaves the camera in place.
    let report = second.gossip_round().await;
    assert_eq!(report.peers_contacted, 1);
    assert_eq!(report.peers_failed, 0);
    assert_eq!(
        second
            .cam_info(VectorClock::new(), "shared".into())
            .await
            .unwrap()
            .value,
        CameraDto::new("shared", 1.0, 2.0)
    );
    assert_eq!(second.clock().as_slice(), &[1, 0]);

    first.shutdown().await.unwrap();
    second.shutdown().await.unwrap();
    assert!(registry.list_children("sightline/replicas").await.unwrap().is_empty());
}
