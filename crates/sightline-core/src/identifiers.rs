//! Identifier newtypes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SightlineError;

/// Identity of a replica. Ids are 1-based; slot `id - 1` of every vector
/// clock counts the updates originated by this replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(u32);

impl ReplicaId {
    /// Create a replica id, rejecting zero.
    pub fn new(id: u32) -> crate::Result<Self> {
        if id == 0 {
            return Err(SightlineError::invalid_argument(
                "replica ids start at 1",
            ));
        }
        Ok(Self(id))
    }

    /// Raw numeric id
    pub fn get(self) -> u32 {
        self.0
    }

    /// Zero-based clock slot owned by this replica
    pub fn slot(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReplicaId {
    type Err = SightlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u32>()
            .map_err(|e| SightlineError::invalid_argument(format!("replica id '{s}': {e}")))?;
        Self::new(id)
    }
}
