//! # Sightline Store
//!
//! Replica-local state and business logic:
//! - [`LocalStore`]: camera and observation tables with exact and pattern
//!   queries
//! - [`OperationEngine`]: validation and execution of the camera and query
//!   operations, plus the entry points used by gossip
//! - [`fixtures`]: the demo dataset loaded by `ctrl_init`
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use sightline_core::{CameraDto, ObservableRef, SystemTimeSource};
//! use sightline_store::OperationEngine;
//!
//! let mut engine = OperationEngine::new(Arc::new(SystemTimeSource));
//! engine.cam_join(&CameraDto::new("Tagus", 38.737613, -9.303164))?;
//! engine.report("Tagus", &[ObservableRef::person(42)])?;
//! # Ok::<(), sightline_core::SightlineError>(())
//! ```

#![forbid(unsafe_code)]

pub mod convert;
pub mod engine;
pub mod fixtures;
pub mod pattern;
pub mod store;

pub use engine::OperationEngine;
pub use pattern::KeyPattern;
pub use store::LocalStore;
