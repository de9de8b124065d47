//! Domain entities
//!
//! Every constructor validates its input, so a value of these types is always
//! well-formed. Values that arrive over the wire are rebuilt through the same
//! constructors before they reach a store.

mod camera;
mod observable;
mod observation;

pub use camera::{validate_name, Camera, MAX_CAMERA_NAME_LEN, MIN_CAMERA_NAME_LEN};
pub use observable::{Observable, ObservableKind, PLATE_LAYOUTS};
pub use observation::Observation;
