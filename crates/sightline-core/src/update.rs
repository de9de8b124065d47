//! Update records exchanged by gossip
//!
//! A record is identified by its origin replica and the origin's clock as it
//! stood right before the update was applied (the causal prefix). The prefix
//! slot of the origin is the record's position in the origin's update
//! sequence: a receiver may apply the record only when its own slot for that
//! origin has exactly that value.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::clock::VectorClock;
use crate::domain::{Camera, Observation};
use crate::identifiers::ReplicaId;

/// Identity of an update: `(origin, causal prefix)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateKey {
    origin: ReplicaId,
    prefix: VectorClock,
}

impl UpdateKey {
    /// Create a key for an update originated at `origin` with causal prefix
    /// `prefix`.
    pub fn new(origin: ReplicaId, prefix: VectorClock) -> Self {
        Self { origin, prefix }
    }

    /// Replica that accepted the update from a client
    pub fn origin(&self) -> ReplicaId {
        self.origin
    }

    /// Origin's clock immediately before the update
    pub fn prefix(&self) -> &VectorClock {
        &self.prefix
    }

    /// Position of this update in the origin's sequence (0-based)
    pub fn sequence(&self) -> u64 {
        self.prefix.get(self.origin)
    }

    /// Delivery order: by origin, then by sequence.
    pub fn delivery_cmp(&self, other: &Self) -> Ordering {
        self.origin
            .cmp(&other.origin)
            .then_with(|| self.sequence().cmp(&other.sequence()))
    }

    /// Whether a replica whose clock is `clock` has not applied this update
    pub fn is_missing_from(&self, clock: &VectorClock) -> bool {
        self.sequence() + 1 > clock.get(self.origin)
    }
}

/// What an update does when applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdatePayload {
    /// A camera joined
    Camera(Camera),
    /// An observation was reported
    Observation(Observation),
}

impl UpdatePayload {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Camera(_) => "camera",
            Self::Observation(_) => "observation",
        }
    }
}

/// A logged update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Identity and causal position
    pub key: UpdateKey,
    /// Effect of the update
    pub payload: UpdatePayload,
}

impl UpdateRecord {
    /// Pair a key with its payload
    pub fn new(key: UpdateKey, payload: UpdatePayload) -> Self {
        Self { key, payload }
    }

    /// Whether a replica whose clock is `clock` is still missing this record.
    pub fn is_missing_from(&self, clock: &VectorClock) -> bool {
        self.key.is_missing_from(clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(id: u32) -> ReplicaId {
        ReplicaId::new(id).unwrap()
    }

    fn camera_record(origin: u32, prefix: Vec<u64>) -> UpdateRecord {
        UpdateRecord::new(
            UpdateKey::new(rid(origin), VectorClock::from(prefix)),
            UpdatePayload::Camera(Camera::new("cam1", 0.0, 0.0).unwrap()),
        )
    }

    #[test]
    fn sequence_is_origin_slot_of_prefix() {
        let key = UpdateKey::new(rid(2), VectorClock::from(vec![7, 3]));
        assert_eq!(key.sequence(), 3);
    }

    #[test]
    fn delivery_order_groups_by_origin() {
        let mut keys = vec![
            UpdateKey::new(rid(2), VectorClock::from(vec![0, 1])),
            UpdateKey::new(rid(1), VectorClock::from(vec![4, 0])),
            UpdateKey::new(rid(2), VectorClock::from(vec![9, 0])),
            UpdateKey::new(rid(1), VectorClock::from(vec![2, 5])),
        ];
        keys.sort_by(UpdateKey::delivery_cmp);
        let order: Vec<_> = keys.iter().map(|k| (k.origin().get(), k.sequence())).collect();
        assert_eq!(order, vec![(1, 2), (1, 4), (2, 0), (2, 1)]);
    }

    #[test]
    fn missing_records_are_at_or_past_requester_cursor() {
        let record = camera_record(1, vec![2, 0]);
        assert!(record.is_missing_from(&VectorClock::from(vec![2])));
        assert!(record.is_missing_from(&VectorClock::new()));
        assert!(!record.is_missing_from(&VectorClock::from(vec![3, 0])));
    }
}
