//! Vector clocks indexed by replica id
//!
//! Slot `i` counts the updates originated by replica `i + 1` that the clock's
//! owner has applied. Clocks of different lengths compare as if the shorter
//! one were padded with zeros, so replicas that join later never invalidate
//! clocks handed out earlier.
//!
//! Only the originating replica calls [`VectorClock::advance`] on its own
//! slot. Every other change is either a pointwise maximum
//! ([`VectorClock::merge`]) or a zero extension ([`VectorClock::align`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::ReplicaId;

/// Causal relationship between two clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    /// Every slot is equal
    Equal,
    /// Strictly dominated by the other clock
    Before,
    /// Strictly dominates the other clock
    After,
    /// Neither clock dominates the other
    Concurrent,
}

/// Per-replica update counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorClock(Vec<u64>);

impl VectorClock {
    /// Create an empty clock
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an all-zero clock with `len` slots
    pub fn with_len(len: usize) -> Self {
        Self(vec![0; len])
    }

    /// Number of explicit slots
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the clock has no explicit slots
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw slot values
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Counter for `replica`, zero when the slot does not exist yet.
    pub fn get(&self, replica: ReplicaId) -> u64 {
        self.0.get(replica.slot()).copied().unwrap_or(0)
    }

    /// Overwrite the counter for `replica`, extending the clock if needed.
    pub fn set(&mut self, replica: ReplicaId, value: u64) {
        self.ensure_slot(replica);
        self.0[replica.slot()] = value;
    }

    /// Increment the counter owned by `replica` and return the new value.
    pub fn advance(&mut self, replica: ReplicaId) -> u64 {
        self.ensure_slot(replica);
        let slot = &mut self.0[replica.slot()];
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Pointwise maximum with `other`. Never lowers a slot.
    pub fn merge(&mut self, other: &VectorClock) {
        self.align(other.len());
        for (mine, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }
    }

    /// Zero-extend to at least `len` slots.
    pub fn align(&mut self, len: usize) {
        if self.0.len() < len {
            self.0.resize(len, 0);
        }
    }

    /// `true` iff every slot of `self` is `>=` the matching slot of `other`.
    pub fn dominates(&self, other: &VectorClock) -> bool {
        let len = self.len().max(other.len());
        (0..len).all(|i| self.slot_or_zero(i) >= other.slot_or_zero(i))
    }

    /// Full causal comparison with `other`.
    pub fn compare(&self, other: &VectorClock) -> ClockOrdering {
        match (self.dominates(other), other.dominates(self)) {
            (true, true) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::After,
            (false, true) => ClockOrdering::Before,
            (false, false) => ClockOrdering::Concurrent,
        }
    }

    /// Sum of all slots, i.e. the number of updates this clock accounts for.
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    fn ensure_slot(&mut self, replica: ReplicaId) {
        self.align(replica.slot() + 1);
    }

    fn slot_or_zero(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl From<Vec<u64>> for VectorClock {
    fn from(slots: Vec<u64>) -> Self {
        Self(slots)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
