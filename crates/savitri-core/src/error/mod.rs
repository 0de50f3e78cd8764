use crate::platform::PermissionStatus;

use std::{fmt, panic::Location};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collaborator and precondition errors with source location tracking.
///
/// Controllers never hand these to their callers. They are caught at the
/// call site, logged, and folded into a state transition plus a
/// `false`/`None` return.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The user or the OS refused access to the resource.
    #[error("Permission denied ({status}) {location}")]
    PermissionDenied {
        /// Permission status reported after the request.
        status: PermissionStatus,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A platform call failed or reported failure.
    #[error("Driver failure during {operation}: {reason} {location}")]
    DriverFailure {
        /// Driver operation that failed (e.g. `start`, `authenticate`).
        operation: &'static str,
        /// Description of the platform failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The operation is not allowed from the current state.
    #[error("Precondition not met: {reason} {location}")]
    PreconditionNotMet {
        /// Which precondition failed.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A single-flight operation was already in progress.
    #[error("{operation} already in progress {location}")]
    ConcurrencyRejected {
        /// Operation that was rejected.
        operation: &'static str,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The secure key-value store failed to read, write or delete a key.
    #[error("Secure store failure for key '{key}': {reason} {location}")]
    StoreFailure {
        /// Key being accessed.
        key: String,
        /// Description of the store failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl CoreError {
    /// Build a [`CoreError::DriverFailure`] at the caller's location.
    #[track_caller]
    pub fn driver(operation: &'static str, reason: impl fmt::Display) -> Self {
        CoreError::DriverFailure {
            operation,
            reason: reason.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Build a [`CoreError::StoreFailure`] at the caller's location.
    #[track_caller]
    pub fn store(key: &str, reason: impl fmt::Display) -> Self {
        CoreError::StoreFailure {
            key: key.to_string(),
            reason: reason.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Taxonomy code for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            CoreError::PermissionDenied { .. } => FailureKind::PermissionDenied,
            CoreError::DriverFailure { .. } | CoreError::StoreFailure { .. } => {
                FailureKind::DriverFailure
            }
            CoreError::PreconditionNotMet { .. } => FailureKind::PreconditionNotMet,
            CoreError::ConcurrencyRejected { .. } => FailureKind::ConcurrencyRejected,
        }
    }
}

/// Why the last operation on a controller failed.
///
/// Store failures are reported as [`FailureKind::DriverFailure`]: from the
/// caller's point of view both are a fallible platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// User/OS refused access. Expected, retryable.
    PermissionDenied,
    /// Platform call threw or returned failure.
    DriverFailure,
    /// Operation not valid from the current state.
    PreconditionNotMet,
    /// Second single-flight call while one was in flight.
    ConcurrencyRejected,
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
