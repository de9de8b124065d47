//! Anti-entropy exchange
//!
//! A round pulls missing update records from a random subset of peers and
//! delivers them causally: records are sorted by `(origin, sequence)` and a
//! record from origin `o` is applied only when the local clock's slot for `o`
//! equals the record's sequence. Records that arrive early are dropped and
//! fetched again in a later round once the gap is filled.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{error, trace};

use sightline_core::{UpdatePayload, UpdateRecord, VectorClock};

use crate::coordinator::ReplicaState;
use crate::registry::RegistryEntry;

/// Outcome of one gossip round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GossipReport {
    /// Peers asked for updates
    pub peers_contacted: usize,
    /// Peers that could not be reached or answered with an error
    pub peers_failed: usize,
    /// Records received across all peers
    pub records_received: usize,
    /// Records whose causal position matched and the store accepted
    pub records_applied: usize,
    /// Records already seen or not yet deliverable
    pub records_dropped: usize,
    /// Records whose causal position matched but the store refused; they
    /// are not logged, so they are never forwarded
    pub records_rejected: usize,
}

/// Shuffle `entries`, drop `own_path` and keep at most `peer_count`
pub(crate) fn choose_peers<R: Rng + ?Sized>(
    mut entries: Vec<RegistryEntry>,
    own_path: &str,
    peer_count: Option<usize>,
    rng: &mut R,
) -> Vec<RegistryEntry> {
    entries.retain(|entry| entry.path != own_path);
    entries.shuffle(rng);
    if let Some(count) = peer_count {
        entries.truncate(count);
    }
    entries
}

/// Per-batch delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub applied: usize,
    pub dropped: usize,
    pub rejected: usize,
}

/// Deliver `records` received from a peer whose clock is `peer_clock`.
///
/// The local clock is only zero-extended to the peer's length here; a slot
/// moves forward solely by delivering the record at that position.
pub(crate) fn deliver(
    state: &mut ReplicaState,
    mut records: Vec<UpdateRecord>,
    peer_clock: &VectorClock,
) -> Delivery {
    let mut delivery = Delivery::default();
    state.clock.align(peer_clock.len());
    records.sort_by(|a, b| a.key.delivery_cmp(&b.key));

    for record in records {
        let origin = record.key.origin();
        let expected = state.clock.get(origin);
        if record.key.sequence() != expected {
            trace!(
                origin = %origin,
                sequence = record.key.sequence(),
                expected,
                "Dropping out-of-order update"
            );
            delivery.dropped += 1;
            continue;
        }

        let label = record.payload.label();
        let outcome = match record.payload.clone() {
            UpdatePayload::Camera(camera) => state.engine.apply_camera(camera).map(|_| ()),
            UpdatePayload::Observation(observation) => state.engine.apply_observation(observation),
        };
        // The position is consumed either way so later updates from the same
        // origin are not blocked; only accepted records are forwarded.
        match outcome {
            Ok(()) => {
                state.log.append(record.key, record.payload);
                delivery.applied += 1;
            }
            Err(e) => {
                error!(origin = %origin, kind = label, error = %e, "Dropping update the store refused");
                delivery.rejected += 1;
            }
        }
        state.clock.advance(origin);
    }

    delivery
}
