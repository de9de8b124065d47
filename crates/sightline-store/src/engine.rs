//! Operation engine
//!
//! Validates wire requests, turns them into domain values and runs them
//! against the replica's [`LocalStore`]. The engine knows nothing about
//! clocks or replication; the coordinator wraps every call with that
//! bookkeeping.
//!
//! # Operations
//!
//! - Writes: `cam_join`, `report`
//! - Reads: `cam_info`, `track`, `track_match`, `trace`
//! - Gossip application: `apply_camera`, `apply_observation`
//! - Control: `ping`, `clear`, `populate_demo`

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use sightline_core::{
    Camera, CameraDto, ObjectType, Observable, ObservableId, ObservableRef, Observation, Result,
    SightlineError, TimeSource,
};

use crate::convert::{observable_kind, to_camera, to_observable};
use crate::fixtures;
use crate::store::LocalStore;

/// Business logic of one replica
#[derive(Debug)]
pub struct OperationEngine {
    store: LocalStore,
    time: Arc<dyn TimeSource>,
}

impl OperationEngine {
    /// Engine over an empty store
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self::with_store(LocalStore::new(), time)
    }

    /// Engine over an existing store
    pub fn with_store(store: LocalStore, time: Arc<dyn TimeSource>) -> Self {
        Self { store, time }
    }

    /// Read access to the underlying tables
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Register a camera. Idempotent for identical coordinates.
    pub fn cam_join(&mut self, request: &CameraDto) -> Result<Camera> {
        let camera = to_camera(request)?;
        self.store.add_camera(camera)
    }

    /// Record a sighting of every target by `camera_name`, stamped with the
    /// current instant. Nothing is stored unless every target is valid.
    pub fn report(
        &mut self,
        camera_name: &str,
        targets: &[ObservableRef],
    ) -> Result<Vec<Observation>> {
        let camera = self.store.get_camera(camera_name)?.clone();
        let observables = targets
            .iter()
            .map(|t| to_observable(t.object_type, &t.id))
            .collect::<Result<Vec<_>>>()?;

        let now = self.time.now();
        let observations: Vec<Observation> = observables
            .into_iter()
            .map(|observable| Observation::new(camera.clone(), observable, now))
            .collect();

        self.store.add_observations(observations.clone())?;
        debug!(
            camera = %camera_name,
            count = observations.len(),
            "Stored report"
        );
        Ok(observations)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Camera registered under `name`
    pub fn cam_info(&self, name: &str) -> Result<Camera> {
        self.store.get_camera(name).cloned()
    }

    /// Most recent sighting of the object, if it was ever seen
    pub fn track(&self, object_type: ObjectType, id: &ObservableId) -> Result<Option<Observation>> {
        let observable = to_observable(object_type, id)?;
        Ok(self
            .store
            .observations_of(&observable)
            .max_by_key(|o| o.timestamp())
            .cloned())
    }

    /// Most recent sighting of every object of `object_type` whose key
    /// matches `pattern`
    pub fn track_match(&self, object_type: ObjectType, pattern: &str) -> Result<Vec<Observation>> {
        let kind = observable_kind(object_type)?;
        let matches = self.store.query_by_type_and_key(kind, pattern, true)?;

        let mut latest: HashMap<&Observable, &Observation> = HashMap::new();
        for observation in matches {
            latest
                .entry(observation.observable())
                .and_modify(|current| {
                    if observation.timestamp() >= current.timestamp() {
                        *current = observation;
                    }
                })
                .or_insert(observation);
        }
        Ok(latest.into_values().cloned().collect())
    }

    /// Every sighting of the object, newest first
    pub fn trace(&self, object_type: ObjectType, id: &ObservableId) -> Result<Vec<Observation>> {
        let observable = to_observable(object_type, id)?;
        let mut path: Vec<Observation> = self.store.observations_of(&observable).cloned().collect();
        // Later insertions first among equal timestamps.
        path.reverse();
        path.sort_by_key(|o| std::cmp::Reverse(o.timestamp()));
        Ok(path)
    }

    // =========================================================================
    // Gossip application
    // =========================================================================

    /// Insert a camera received from a peer
    pub fn apply_camera(&mut self, camera: Camera) -> Result<Camera> {
        self.store.add_camera(camera)
    }

    /// Insert an observation received from a peer, keeping its timestamp
    pub fn apply_observation(&mut self, observation: Observation) -> Result<()> {
        self.store.add_observation(observation)
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Liveness greeting
    pub fn ping(&self, name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(SightlineError::invalid_argument("ping name must not be blank"));
        }
        Ok(format!("Hello {name}!"))
    }

    /// Wipe the store
    pub fn clear(&mut self) {
        self.store.reset();
    }

    /// Load the demo dataset, ending at the current instant
    pub fn populate_demo(&mut self) -> Result<()> {
        let now = self.time.now();
        fixtures::populate(&mut self.store, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use sightline_core::ManualTimeSource;

    fn engine() -> (OperationEngine, ManualTimeSource) {
        let time = ManualTimeSource::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        (OperationEngine::new(Arc::new(time.clone())), time)
    }

    #[test]
    fn report_to_unknown_camera_is_not_found_even_with_bad_ids() {
        let (mut engine, _) = engine();
        let targets = [ObservableRef::car("bad")];
        assert_matches!(
            engine.report("nocam", &targets),
            Err(SightlineError::NotFound { .. })
        );
    }

    #[test]
    fn report_is_atomic() {
        let (mut engine, _) = engine();
        engine.cam_join(&CameraDto::new("cam1", 0.0, 0.0)).unwrap();

        let targets = [ObservableRef::person(1), ObservableRef::car("not-a-plate")];
        assert_matches!(
            engine.report("cam1", &targets),
            Err(SightlineError::InvalidArgument { .. })
        );
        assert_eq!(engine.store().observation_count(), 0);
    }

    #[test]
    fn report_is_stamped_with_current_instant() {
        let (mut engine, time) = engine();
        engine.cam_join(&CameraDto::new("cam1", 0.0, 0.0)).unwrap();
        time.advance_secs(30);

        let stored = engine.report("cam1", &[ObservableRef::person(7)]).unwrap();
        assert_eq!(stored[0].timestamp().timestamp(), 1_700_000_030);
    }

    #[test]
    fn track_returns_latest_and_none_for_unseen() {
        let (mut engine, time) = engine();
        for name in ["camA", "camB", "camC"] {
            engine.cam_join(&CameraDto::new(name, 0.0, 0.0)).unwrap();
            engine.report(name, &[ObservableRef::person(1)]).unwrap();
            time.advance_secs(1);
        }

        let latest = engine
            .track(ObjectType::Person, &ObservableId::Person(1))
            .unwrap()
            .unwrap();
        assert_eq!(latest.camera().name(), "camC");
        assert!(engine
            .track(ObjectType::Person, &ObservableId::Person(2))
            .unwrap()
            .is_none());
    }

    #[test]
    fn track_match_keeps_one_observation_per_object() {
        let (mut engine, time) = engine();
        engine.cam_join(&CameraDto::new("camA", 0.0, 0.0)).unwrap();
        engine.cam_join(&CameraDto::new("camB", 0.0, 0.0)).unwrap();
        engine
            .report("camA", &[ObservableRef::car("AABB10"), ObservableRef::car("AABB11")])
            .unwrap();
        time.advance_secs(5);
        engine.report("camB", &[ObservableRef::car("AABB10")]).unwrap();

        let mut found = engine.track_match(ObjectType::Car, "AABB1*").unwrap();
        found.sort_by(|a, b| a.observable().cmp(b.observable()));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].camera().name(), "camB");
        assert_eq!(found[1].camera().name(), "camA");
    }

    #[test]
    fn trace_is_newest_first() {
        let (mut engine, time) = engine();
        for name in ["cam1", "cam2", "cam3"] {
            engine.cam_join(&CameraDto::new(name, 0.0, 0.0)).unwrap();
        }
        for name in ["cam2", "cam1", "cam3"] {
            engine.report(name, &[ObservableRef::person(4)]).unwrap();
            time.advance_secs(10);
        }

        let path = engine
            .trace(ObjectType::Person, &ObservableId::Person(4))
            .unwrap();
        let cameras: Vec<_> = path.iter().map(|o| o.camera().name().to_string()).collect();
        assert_eq!(cameras, ["cam3", "cam1", "cam2"]);
        assert!(path.windows(2).all(|w| w[0].timestamp() > w[1].timestamp()));
    }

    #[test]
    fn queries_reject_unspecified_type() {
        let (engine, _) = engine();
        assert_matches!(
            engine.track_match(ObjectType::Unspecified, "1*"),
            Err(SightlineError::InvalidArgument { .. })
        );
        assert_matches!(
            engine.trace(ObjectType::Unspecified, &ObservableId::Person(1)),
            Err(SightlineError::InvalidArgument { .. })
        );
    }

    #[test]
    fn ping_greets_by_name() {
        let (engine, _) = engine();
        assert_eq!(engine.ping("friend").unwrap(), "Hello friend!");
        assert!(engine.ping("").is_err());
    }
}
