//! Unified error system for Sightline
//!
//! Business-rule failures collapse into three kinds (`InvalidArgument`,
//! `NotFound`, `AlreadyExists`), all terminal for the request that produced
//! them. Transport failures are kept apart as `Unavailable` because they are
//! the only errors callers retry.

use serde::{Deserialize, Serialize};

/// Unified error type for all Sightline operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SightlineError {
    /// Malformed or missing input
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message describing the invalid input
        message: String,
    },

    /// Referenced entity does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Conflicting creation of an existing identity
    #[error("Already exists: {message}")]
    AlreadyExists {
        /// Error message describing the conflict
        message: String,
    },

    /// Replica or registry could not be reached
    #[error("Unavailable: {message}")]
    Unavailable {
        /// Error message describing the transport failure
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl SightlineError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an already exists error
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Create a transport unavailability error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the failure happened below the business layer and may succeed
    /// against a different replica.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Short stable name of the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Unavailable { .. } => "unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Standard Result type for Sightline operations
pub type Result<T> = std::result::Result<T, SightlineError>;

impl From<std::io::Error> for SightlineError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SightlineError::invalid_argument("camera name too short");
        assert!(matches!(err, SightlineError::InvalidArgument { .. }));
        assert_eq!(err.to_string(), "Invalid argument: camera name too short");
    }

    #[test]
    fn test_only_unavailable_is_transport() {
        assert!(SightlineError::unavailable("down").is_transport());
        assert!(!SightlineError::not_found("x").is_transport());
        assert!(!SightlineError::already_exists("x").is_transport());
        assert!(!SightlineError::invalid_argument("x").is_transport());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(SightlineError::from(io_err).is_transport());
    }
}
