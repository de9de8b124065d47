//! Replica-local tables
//!
//! `LocalStore` is a plain value: mutation goes through `&mut self` and the
//! owner decides how to share it. Within a replica the coordinator wraps it in
//! a single lock together with the vector clock and update logs.

use std::collections::BTreeMap;

use sightline_core::{Camera, Observable, ObservableKind, Observation, Result, SightlineError};

use crate::pattern::KeyPattern;

/// Cameras by name plus the observation table of one replica
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    cameras: BTreeMap<String, Camera>,
    observations: Vec<Observation>,
}

impl LocalStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `camera`.
    ///
    /// Re-registering a camera with the same coordinates succeeds and returns
    /// the stored camera. A different location under a taken name is
    /// `AlreadyExists`.
    pub fn add_camera(&mut self, camera: Camera) -> Result<Camera> {
        if let Some(existing) = self.cameras.get(camera.name()) {
            if existing.same_location(&camera) {
                return Ok(existing.clone());
            }
            return Err(SightlineError::already_exists(format!(
                "camera '{}' already registered at a different location",
                camera.name()
            )));
        }
        self.cameras.insert(camera.name().to_string(), camera.clone());
        Ok(camera)
    }

    /// Camera registered under `name`
    pub fn get_camera(&self, name: &str) -> Result<&Camera> {
        if name.trim().is_empty() {
            return Err(SightlineError::invalid_argument("camera name must not be blank"));
        }
        self.cameras
            .get(name)
            .ok_or_else(|| SightlineError::not_found(format!("camera '{name}' not found")))
    }

    /// Insert one observation. Its camera must already be registered.
    pub fn add_observation(&mut self, observation: Observation) -> Result<()> {
        self.check_observation(&observation)?;
        self.observations.push(observation);
        Ok(())
    }

    /// Insert a batch. Either every observation is inserted or none is.
    pub fn add_observations(&mut self, observations: Vec<Observation>) -> Result<()> {
        for observation in &observations {
            self.check_observation(observation)?;
        }
        self.observations.extend(observations);
        Ok(())
    }

    /// Observations of `kind` whose key equals `key`, or matches it as a
    /// pattern when `is_pattern` is set. Order is unspecified.
    pub fn query_by_type_and_key(
        &self,
        kind: ObservableKind,
        key: &str,
        is_pattern: bool,
    ) -> Result<Vec<&Observation>> {
        if key.trim().is_empty() {
            return Err(SightlineError::invalid_argument("key must not be blank"));
        }

        let of_kind = self
            .observations
            .iter()
            .filter(move |o| o.observable().kind() == kind);

        if is_pattern {
            let pattern = KeyPattern::new(key)?;
            Ok(of_kind
                .filter(|o| pattern.matches(o.observable().key()))
                .collect())
        } else {
            Ok(of_kind.filter(|o| o.observable().key() == key).collect())
        }
    }

    /// Every observation of `observable`, in insertion order
    pub fn observations_of<'a>(
        &'a self,
        observable: &'a Observable,
    ) -> impl Iterator<Item = &'a Observation> + 'a {
        self.observations
            .iter()
            .filter(move |o| o.observable() == observable)
    }

    /// Drop every camera and observation
    pub fn reset(&mut self) {
        self.cameras.clear();
        self.observations.clear();
    }

    /// Number of registered cameras
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// Number of stored observations
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    /// Registered cameras ordered by name
    pub fn cameras(&self) -> impl Iterator<Item = &Camera> {
        self.cameras.values()
    }

    fn check_observation(&self, observation: &Observation) -> Result<()> {
        let name = observation.camera().name();
        if !self.cameras.contains_key(name) {
            return Err(SightlineError::not_found(format!("camera '{name}' not found")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    fn camera(name: &str, lat: f64) -> Camera {
        Camera::new(name, lat, 0.0).unwrap()
    }

    fn seen(camera: &Camera, observable: Observable, secs: i64) -> Observation {
        Observation::new(
            camera.clone(),
            observable,
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    #[test]
    fn joining_twice_at_the_same_place_is_a_no_op() {
        let mut store = LocalStore::new();
        store.add_camera(camera("cam1", 1.0)).unwrap();
        let again = store.add_camera(camera("cam1", 1.0)).unwrap();

        assert_eq!(again, camera("cam1", 1.0));
        assert_eq!(store.camera_count(), 1);
    }

    #[test]
    fn joining_elsewhere_under_a_taken_name_conflicts() {
        let mut store = LocalStore::new();
        store.add_camera(camera("cam1", 1.0)).unwrap();

        assert_matches!(
            store.add_camera(camera("cam1", 2.0)),
            Err(SightlineError::AlreadyExists { .. })
        );
        assert_eq!(store.get_camera("cam1").unwrap().latitude(), 1.0);
    }

    #[test]
    fn unknown_and_blank_camera_lookups() {
        let store = LocalStore::new();
        assert_matches!(store.get_camera("nope"), Err(SightlineError::NotFound { .. }));
        assert_matches!(store.get_camera(" "), Err(SightlineError::InvalidArgument { .. }));
    }

    #[test]
    fn observation_requires_registered_camera() {
        let mut store = LocalStore::new();
        let cam = camera("cam1", 1.0);

        assert_matches!(
            store.add_observation(seen(&cam, Observable::person(1), 10)),
            Err(SightlineError::NotFound { .. })
        );
        assert_eq!(store.observation_count(), 0);
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let mut store = LocalStore::new();
        let known = camera("cam1", 1.0);
        let unknown = camera("cam2", 1.0);
        store.add_camera(known.clone()).unwrap();

        let batch = vec![
            seen(&known, Observable::person(1), 10),
            seen(&unknown, Observable::person(2), 10),
        ];
        assert!(store.add_observations(batch).is_err());
        assert_eq!(store.observation_count(), 0);
    }

    #[test]
    fn exact_and_pattern_queries_respect_kind() {
        let mut store = LocalStore::new();
        let cam = camera("cam1", 1.0);
        store.add_camera(cam.clone()).unwrap();
        store
            .add_observations(vec![
                seen(&cam, Observable::person(10), 1),
                seen(&cam, Observable::person(105), 2),
                seen(&cam, Observable::person(11), 3),
                seen(&cam, Observable::car("AABB10").unwrap(), 4),
            ])
            .unwrap();

        let exact = store
            .query_by_type_and_key(ObservableKind::Person, "10", false)
            .unwrap();
        assert_eq!(exact.len(), 1);

        let matched = store
            .query_by_type_and_key(ObservableKind::Person, "10*", true)
            .unwrap();
        assert_eq!(matched.len(), 2);

        let cars = store
            .query_by_type_and_key(ObservableKind::Car, "*10", true)
            .unwrap();
        assert_eq!(cars.len(), 1);

        assert_matches!(
            store.query_by_type_and_key(ObservableKind::Car, "", false),
            Err(SightlineError::InvalidArgument { .. })
        );
    }

    #[test]
    fn reset_empties_both_tables() {
        let mut store = LocalStore::new();
        let cam = camera("cam1", 1.0);
        store.add_camera(cam.clone()).unwrap();
        store
            .add_observation(seen(&cam, Observable::person(1), 1))
            .unwrap();

        store.reset();
        assert_eq!(store.camera_count(), 0);
        assert_eq!(store.observation_count(), 0);
    }
}
