//! Queries against the `ctrl_init` demo dataset

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sightline_core::{ManualTimeSource, ObjectType, ObservableId, ObservableRef, TimeSource};
use sightline_store::OperationEngine;

fn demo_engine() -> (OperationEngine, ManualTimeSource) {
    let time = ManualTimeSource::new(Utc.timestamp_opt(1_600_000_000, 0).unwrap());
    let mut engine = OperationEngine::new(Arc::new(time.clone()));
    engine.populate_demo().unwrap();
    (engine, time)
}

#[test]
fn person_one_was_last_seen_at_camera_nine() {
    let (engine, _) = demo_engine();
    let latest = engine
        .track(ObjectType::Person, &ObservableId::Person(1))
        .unwrap()
        .unwrap();
    assert_eq!(latest.camera().name(), "CAMERA9");
}

#[test]
fn ten_star_matches_eleven_people() {
    let (engine, _) = demo_engine();
    let found = engine.track_match(ObjectType::Person, "10*").unwrap();
    let keys: BTreeSet<_> = found
        .iter()
        .map(|o| o.observable().key().to_string())
        .collect();

    assert_eq!(found.len(), 11);
    assert!(keys.contains("10"));
    assert!(keys.contains("109"));
}

#[test]
fn late_pair_ends_at_camera_two() {
    let (engine, _) = demo_engine();
    let path = engine
        .trace(ObjectType::Car, &ObservableId::Car("ZZZZ99".into()))
        .unwrap();
    let cameras: Vec<_> = path.iter().map(|o| o.camera().name()).collect();
    assert_eq!(cameras, ["CAMERA2", "CAMERA1"]);
}

#[test]
fn reports_after_init_are_the_newest() {
    let (mut engine, time) = demo_engine();
    time.advance_secs(1);
    engine
        .report("CAMERA5", &[ObservableRef::car("AABB10")])
        .unwrap();

    let latest = engine
        .track(ObjectType::Car, &ObservableId::Car("AABB10".into()))
        .unwrap()
        .unwrap();
    assert_eq!(latest.camera().name(), "CAMERA5");
}

#[test]
fn clear_then_populate_is_repeatable() {
    let (mut engine, _) = demo_engine();
    let before = engine.store().observation_count();
    engine.clear();
    engine.populate_demo().unwrap();
    assert_eq!(engine.store().observation_count(), before);
}

#[test]
fn demo_car_trace_is_strictly_newest_first() {
    let (engine, time) = demo_engine();
    let path = engine
        .trace(ObjectType::Car, &ObservableId::Car("AABB10".into()))
        .unwrap();

    assert_eq!(path.len(), 11);
    assert!(path
        .windows(2)
        .all(|pair| pair[0].timestamp() > pair[1].timestamp()));
    assert!(path[0].timestamp() <= time.now());
    assert_eq!(path[0].camera().name(), "CAMERA9");
}
