//! Read cache for monotonic reads
//!
//! Holds the last accepted answer per query. When a replica answers with a
//! clock older than what the session has already observed, the session
//! serves the cached answer instead so reads never go back in time.
//!
//! Eviction is FIFO over insertion order across every query kind. Refreshing
//! an entry moves it to the back. A capacity of zero disables caching.

use indexmap::IndexMap;

use sightline_core::{CameraDto, ObjectType, ObservableId, ObservationDto, Result, SightlineError};

/// Identity of a cacheable query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuerySignature {
    /// `cam_info(name)`
    CamInfo(String),
    /// `track(type, id)`
    Track(ObjectType, ObservableId),
    /// `track_match(type, pattern)`
    TrackMatch(ObjectType, String),
    /// `trace(type, id)`
    Trace(ObjectType, ObservableId),
}

/// A cached answer
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResponse {
    /// Camera details
    Camera(CameraDto),
    /// Latest sighting, if any
    Tracked(Option<ObservationDto>),
    /// List of sightings
    Observations(Vec<ObservationDto>),
}

impl CachedResponse {
    /// Camera answer, or `Internal` for any other kind
    pub fn into_camera(self) -> Result<CameraDto> {
        match self {
            Self::Camera(camera) => Ok(camera),
            other => Err(mismatch("camera", &other)),
        }
    }

    /// Track answer, or `Internal` for any other kind
    pub fn into_tracked(self) -> Result<Option<ObservationDto>> {
        match self {
            Self::Tracked(observation) => Ok(observation),
            other => Err(mismatch("track", &other)),
        }
    }

    /// List answer, or `Internal` for any other kind
    pub fn into_observations(self) -> Result<Vec<ObservationDto>> {
        match self {
            Self::Observations(observations) => Ok(observations),
            other => Err(mismatch("observation list", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &CachedResponse) -> SightlineError {
    SightlineError::internal(format!("expected a {expected} response, found {found:?}"))
}

/// Bounded FIFO cache of query answers
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    capacity: usize,
    entries: IndexMap<QuerySignature, CachedResponse>,
}

impl ResponseCache {
    /// Cache holding at most `capacity` answers
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Cache that stores nothing
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Cached answer for `signature`
    pub fn get(&self, signature: &QuerySignature) -> Option<&CachedResponse> {
        self.entries.get(signature)
    }

    /// Store `response`, evicting the oldest entries beyond capacity
    pub fn insert(&mut self, signature: QuerySignature, response: CachedResponse) {
        if self.capacity == 0 {
            return;
        }
        self.entries.shift_remove(&signature);
        self.entries.insert(signature, response);
        while self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0);
        }
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
