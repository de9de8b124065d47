//! Tracked objects: people and cars

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SightlineError;

/// Accepted car plate layouts (L = uppercase letter, D = digit).
pub const PLATE_LAYOUTS: [&str; 6] = ["LLLLDD", "LLDDLL", "DDLLLL", "DDDDLL", "DDLLDD", "LLDDDD"];

/// Variant of a tracked object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObservableKind {
    /// A person identified by a non-negative integer
    Person,
    /// A car identified by its plate
    Car,
}

impl fmt::Display for ObservableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Person => write!(f, "person"),
            Self::Car => write!(f, "car"),
        }
    }
}

/// A tracked object. Identity is `(kind, key)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawObservable")]
pub struct Observable {
    kind: ObservableKind,
    key: String,
}

impl Observable {
    /// A person with numeric id `id`
    pub fn person(id: u64) -> Self {
        Self {
            kind: ObservableKind::Person,
            key: id.to_string(),
        }
    }

    /// A car with plate `plate`, validated against [`PLATE_LAYOUTS`].
    pub fn car(plate: impl Into<String>) -> crate::Result<Self> {
        let plate = plate.into();
        if !is_valid_plate(&plate) {
            return Err(SightlineError::invalid_argument(format!(
                "'{plate}' is not a valid car plate"
            )));
        }
        Ok(Self {
            kind: ObservableKind::Car,
            key: plate,
        })
    }

    /// Build an observable from a kind and a string key, validating the key
    /// for that kind. Person keys are normalised to their canonical base-10
    /// form.
    pub fn parse(kind: ObservableKind, key: &str) -> crate::Result<Self> {
        match kind {
            ObservableKind::Person => parse_person_key(key).map(Self::person),
            ObservableKind::Car => Self::car(key),
        }
    }

    /// Variant of this object
    pub fn kind(&self) -> ObservableKind {
        self.kind
    }

    /// Identifying key
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Deserialize)]
struct RawObservable {
    kind: ObservableKind,
    key: String,
}

impl TryFrom<RawObservable> for Observable {
    type Error = SightlineError;

    fn try_from(raw: RawObservable) -> crate::Result<Self> {
        Observable::parse(raw.kind, &raw.key)
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.kind, self.key)
    }
}

fn parse_person_key(key: &str) -> crate::Result<u64> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SightlineError::invalid_argument(format!(
            "'{key}' is not a valid person id"
        )));
    }
    key.parse::<u64>()
        .map_err(|e| SightlineError::invalid_argument(format!("person id '{key}': {e}")))
}

fn is_valid_plate(plate: &str) -> bool {
    if plate.len() != 6 || !plate.is_ascii() {
        return false;
    }
    let mut layout = [0u8; 6];
    for (slot, byte) in layout.iter_mut().zip(plate.bytes()) {
        *slot = match byte {
            b'A'..=b'Z' => b'L',
            b'0'..=b'9' => b'D',
            _ => return false,
        };
    }
    PLATE_LAYOUTS.iter().any(|l| l.as_bytes() == layout)
}
