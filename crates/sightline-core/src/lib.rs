//! # Sightline Core
//!
//! Foundation types shared by every Sightline crate:
//! - Domain entities (`Camera`, `Observable`, `Observation`) validated at
//!   construction
//! - `VectorClock`, the per-replica causal progress vector
//! - `UpdateRecord`, the unit exchanged by gossip
//! - Wire DTOs carried by the RPC layer
//! - The unified `SightlineError`
//!
//! ## Design Principles
//!
//! - **Values, not references**: clocks and records cross replica boundaries
//!   by value only
//! - **Validate once**: a domain value that exists is well-formed
//! - **Injected time**: nothing here reads the system clock directly

#![forbid(unsafe_code)]

pub mod clock;
pub mod domain;
pub mod errors;
pub mod identifiers;
pub mod messages;
pub mod time;
pub mod update;

pub use clock::{ClockOrdering, VectorClock};
pub use domain::{Camera, Observable, ObservableKind, Observation};
pub use errors::{Result, SightlineError};
pub use identifiers::ReplicaId;
pub use messages::{CameraDto, ObjectType, ObservableId, ObservableRef, ObservationDto};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use update::{UpdateKey, UpdatePayload, UpdateRecord};
