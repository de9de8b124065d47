//! Append-only update logs
//!
//! Every update a replica applies, whether accepted from a client or
//! received by gossip, is kept here under its `UpdateKey` so it can be
//! forwarded to peers that have not seen it. Nothing is compacted; only
//! `ctrl_clear` empties the logs.

use std::collections::HashMap;

use sightline_core::{Camera, Observation, UpdateKey, UpdatePayload, UpdateRecord, VectorClock};

/// Camera and observation update logs of one replica
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    cameras: HashMap<UpdateKey, Camera>,
    observations: HashMap<UpdateKey, Observation>,
}

impl UpdateLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `payload` under `key`. A key is logged at most once; returns
    /// `false` if it was already present.
    pub fn append(&mut self, key: UpdateKey, payload: UpdatePayload) -> bool {
        if self.contains(&key) {
            return false;
        }
        match payload {
            UpdatePayload::Camera(camera) => {
                self.cameras.insert(key, camera);
            }
            UpdatePayload::Observation(observation) => {
                self.observations.insert(key, observation);
            }
        }
        true
    }

    /// Whether `key` has been logged
    pub fn contains(&self, key: &UpdateKey) -> bool {
        self.cameras.contains_key(key) || self.observations.contains_key(key)
    }

    /// Up to `limit` records a replica at `clock` is still missing, lowest
    /// sequence first within each origin
    pub fn missing_from(&self, clock: &VectorClock, limit: usize) -> Vec<UpdateRecord> {
        let mut keys: Vec<&UpdateKey> = self
            .cameras
            .keys()
            .chain(self.observations.keys())
            .filter(|key| key.is_missing_from(clock))
            .collect();
        keys.sort_by(|a, b| a.delivery_cmp(b));
        keys.truncate(limit);
        keys.into_iter().filter_map(|key| self.record(key)).collect()
    }

    fn record(&self, key: &UpdateKey) -> Option<UpdateRecord> {
        if let Some(camera) = self.cameras.get(key) {
            return Some(UpdateRecord::new(key.clone(), UpdatePayload::Camera(camera.clone())));
        }
        self.observations.get(key).map(|observation| {
            UpdateRecord::new(key.clone(), UpdatePayload::Observation(observation.clone()))
        })
    }

    /// Total number of logged updates
    pub fn len(&self) -> usize {
        self.cameras.len() + self.observations.len()
    }

    /// Whether nothing is logged
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every logged update
    pub fn clear(&mut self) {
        self.cameras.clear();
        self.observations.clear();
    }
}
