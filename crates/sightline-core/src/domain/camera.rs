//! Fixed cameras

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SightlineError;

/// Shortest accepted camera name
pub const MIN_CAMERA_NAME_LEN: usize = 3;
/// Longest accepted camera name
pub const MAX_CAMERA_NAME_LEN: usize = 15;

/// A camera registered at a fixed location.
///
/// The name is the identity. Two cameras with the same name and the same
/// coordinates are the same camera; the same name with different coordinates
/// is a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCamera")]
pub struct Camera {
    name: String,
    latitude: f64,
    longitude: f64,
}

impl Camera {
    /// Create a camera after validating name and coordinates.
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> crate::Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        validate_coordinates(latitude, longitude)?;
        Ok(Self {
            name,
            latitude,
            longitude,
        })
    }

    /// Camera name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Whether `other` sits at exactly the same coordinates.
    #[allow(clippy::float_cmp)]
    pub fn same_location(&self, other: &Camera) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

/// Decoded fields, checked by [`Camera::new`] before a `Camera` exists
#[derive(Deserialize)]
struct RawCamera {
    name: String,
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCamera> for Camera {
    type Error = SightlineError;

    fn try_from(raw: RawCamera) -> crate::Result<Self> {
        Camera::new(raw.name, raw.latitude, raw.longitude)
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.name, self.latitude, self.longitude)
    }
}

/// Check the camera name rules: 3 to 15 ASCII letters or digits.
pub fn validate_name(name: &str) -> crate::Result<()> {
    if name.trim().is_empty() {
        return Err(SightlineError::invalid_argument("camera name is empty"));
    }
    let len = name.chars().count();
    if !(MIN_CAMERA_NAME_LEN..=MAX_CAMERA_NAME_LEN).contains(&len) {
        return Err(SightlineError::invalid_argument(format!(
            "camera name '{name}' must have between {MIN_CAMERA_NAME_LEN} and {MAX_CAMERA_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SightlineError::invalid_argument(format!(
            "camera name '{name}' must be alphanumeric"
        )));
    }
    Ok(())
}

fn validate_coordinates(latitude: f64, longitude: f64) -> crate::Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(SightlineError::invalid_argument(format!(
            "latitude {latitude} outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(SightlineError::invalid_argument(format!(
            "longitude {longitude} outside [-180, 180]"
        )));
    }
    Ok(())
}
