//! Wire to domain conversion

use sightline_core::{
    Camera, CameraDto, ObjectType, Observable, ObservableId, ObservableKind, Observation,
    ObservationDto, Result, SightlineError,
};

/// Domain kind for a declared wire type
pub fn observable_kind(object_type: ObjectType) -> Result<ObservableKind> {
    match object_type {
        ObjectType::Person => Ok(ObservableKind::Person),
        ObjectType::Car => Ok(ObservableKind::Car),
        ObjectType::Unspecified => Err(SightlineError::invalid_argument(
            "object type must be specified",
        )),
    }
}

/// Validated observable for a declared type and id. The id variant must
/// agree with the declared type.
pub fn to_observable(object_type: ObjectType, id: &ObservableId) -> Result<Observable> {
    match (observable_kind(object_type)?, id) {
        (ObservableKind::Person, ObservableId::Person(n)) => Ok(Observable::person(*n)),
        (ObservableKind::Car, ObservableId::Car(plate)) => Observable::car(plate.as_str()),
        (kind, id) => Err(SightlineError::invalid_argument(format!(
            "id {id:?} does not identify a {kind}"
        ))),
    }
}

/// Validated camera from its wire form
pub fn to_camera(dto: &CameraDto) -> Result<Camera> {
    Camera::try_from(dto)
}

/// Response form of a batch of observations
pub fn observation_dtos<'a, I>(observations: I) -> Result<Vec<ObservationDto>>
where
    I: IntoIterator<Item = &'a Observation>,
{
    observations
        .into_iter()
        .map(ObservationDto::try_from)
        .collect()
}
