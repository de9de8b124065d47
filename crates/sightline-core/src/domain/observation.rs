//! Sightings

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::{Camera, Observable};

/// One sighting of an observable by a camera. Timestamps have second
/// resolution; sub-second precision is dropped at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawObservation")]
pub struct Observation {
    camera: Camera,
    observable: Observable,
    timestamp: DateTime<Utc>,
}

impl Observation {
    /// Create an observation, truncating `timestamp` to whole seconds.
    pub fn new(camera: Camera, observable: Observable, timestamp: DateTime<Utc>) -> Self {
        Self {
            camera,
            observable,
            timestamp: timestamp.trunc_subsecs(0),
        }
    }

    /// Camera that made the sighting
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Object that was seen
    pub fn observable(&self) -> &Observable {
        &self.observable
    }

    /// When the object was seen
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Deserialize)]
struct RawObservation {
    camera: Camera,
    observable: Observable,
    timestamp: DateTime<Utc>,
}

impl From<RawObservation> for Observation {
    fn from(raw: RawObservation) -> Self {
        Observation::new(raw.camera, raw.observable, raw.timestamp)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.observable,
            self.timestamp.to_rfc3339(),
            self.camera
        )
    }
}
