//! Wire representations
//!
//! These are the shapes carried by the RPC layer. They are deliberately loose
//! (an `ObjectType` may be unspecified, an id may not match its declared type)
//! and are turned into validated domain values by the operation engine.

use serde::{Deserialize, Serialize};

use crate::domain::{Camera, Observable, ObservableKind, Observation};
use crate::errors::SightlineError;

/// Declared type of an observable on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// No type supplied
    #[default]
    Unspecified,
    /// A person
    Person,
    /// A car
    Car,
}

impl From<ObservableKind> for ObjectType {
    fn from(kind: ObservableKind) -> Self {
        match kind {
            ObservableKind::Person => Self::Person,
            ObservableKind::Car => Self::Car,
        }
    }
}

/// Observable id on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservableId {
    /// Numeric person id
    Person(u64),
    /// Car plate
    Car(String),
}

impl TryFrom<&Observable> for ObservableId {
    type Error = SightlineError;

    fn try_from(observable: &Observable) -> Result<Self, Self::Error> {
        match observable.kind() {
            ObservableKind::Person => observable
                .key()
                .parse::<u64>()
                .map(Self::Person)
                .map_err(|e| SightlineError::internal(format!("stored person key: {e}"))),
            ObservableKind::Car => Ok(Self::Car(observable.key().to_string())),
        }
    }
}

/// Target of a report: declared type plus id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservableRef {
    /// Declared type
    pub object_type: ObjectType,
    /// Id, which must agree with `object_type`
    pub id: ObservableId,
}

impl ObservableRef {
    /// Pair a type with an id
    pub fn new(object_type: ObjectType, id: ObservableId) -> Self {
        Self { object_type, id }
    }

    /// A person by numeric id
    pub fn person(id: u64) -> Self {
        Self::new(ObjectType::Person, ObservableId::Person(id))
    }

    /// A car by plate
    pub fn car(plate: impl Into<String>) -> Self {
        Self::new(ObjectType::Car, ObservableId::Car(plate.into()))
    }
}

/// Camera on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDto {
    /// Camera name
    pub name: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl CameraDto {
    /// Convenience constructor
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

impl From<&Camera> for CameraDto {
    fn from(camera: &Camera) -> Self {
        Self {
            name: camera.name().to_string(),
            latitude: camera.latitude(),
            longitude: camera.longitude(),
        }
    }
}

impl TryFrom<&CameraDto> for Camera {
    type Error = SightlineError;

    fn try_from(dto: &CameraDto) -> Result<Self, Self::Error> {
        Camera::new(dto.name.clone(), dto.latitude, dto.longitude)
    }
}

/// Observation on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDto {
    /// Declared type of the observable
    pub object_type: ObjectType,
    /// Observable id
    pub id: ObservableId,
    /// Camera that made the sighting
    pub camera: CameraDto,
    /// Seconds since the Unix epoch
    pub timestamp_secs: i64,
}

impl TryFrom<&Observation> for ObservationDto {
    type Error = SightlineError;

    fn try_from(observation: &Observation) -> Result<Self, Self::Error> {
        Ok(Self {
            object_type: observation.observable().kind().into(),
            id: ObservableId::try_from(observation.observable())?,
            camera: CameraDto::from(observation.camera()),
            timestamp_secs: observation.timestamp().timestamp(),
        })
    }
}
