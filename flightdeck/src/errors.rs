//! Error types for flightdeck.
//!
//! Every failure a step, store or runner can report is a [`FlightError`].
//! Errors are classified by [`ErrorKind`]; only [`ErrorKind::Transient`]
//! errors are retried by the executor.

use crate::core::FlightStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The main error type for flight operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlightError {
    /// A transient backend failure (serialization conflict, timeout, contention).
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The resource is locked by other flights.
    #[error("Resource {resource} is locked by {}", holders.join(", "))]
    LockConflict {
        /// The contested resource.
        resource: String,
        /// Flight ids currently holding a lock on it.
        holders: Vec<String>,
    },

    /// A lock expected to be held was not found.
    #[error("Lock {lock_name} is not held on {resource}")]
    LockNotHeld {
        /// The resource.
        resource: String,
        /// The lock name that was expected.
        lock_name: String,
    },

    /// A manual unlock named a lock that does not exist on the resource.
    #[error("Lock {lock_name} not found on {resource}; existing locks: [{}]", existing.join(", "))]
    LockNameNotFound {
        /// The resource.
        resource: String,
        /// The lock name that was requested.
        lock_name: String,
        /// The lock names that do exist.
        existing: Vec<String>,
    },

    /// A manual unlock targeted a lock whose holder flight is still active.
    #[error("Lock {lock_name} is held by flight {flight_id} which is still {status}")]
    JobStillActive {
        /// The lock name.
        lock_name: String,
        /// The holder flight.
        flight_id: String,
        /// The holder's current status.
        status: FlightStatus,
    },

    /// The referenced resource does not exist.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A resource with the same identity already exists.
    #[error("Resource already exists: {0}")]
    ResourceExists(String),

    /// A required value was missing from the input parameters or working map.
    #[error("Missing required value: {0}")]
    MissingValue(String),

    /// A value could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No flight definition is registered under this type.
    #[error("Unknown flight type: {0}")]
    UnknownFlightType(String),

    /// The runner has no record of this flight.
    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    /// The flight has not reached a terminal status yet.
    #[error("Flight {0} has not completed")]
    JobNotComplete(String),

    /// The runner is shutting down and accepts no new flights.
    #[error("Runner is shutting down")]
    Shutdown,

    /// A configuration value is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An unexpected internal error, including a panicking step.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An undo action failed; resource state may be inconsistent.
    #[error("Undo of step {step} failed: {message}")]
    Dismal {
        /// The step whose undo failed.
        step: String,
        /// The undo failure.
        message: String,
    },
}

/// Coarse classification of a [`FlightError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Expected to clear on retry.
    Transient,
    /// Blocked by another flight's lock or activity.
    LockConflict,
    /// The target does not exist.
    NotFound,
    /// The request itself is invalid.
    BadRequest,
    /// A bug or unexpected condition.
    Internal,
    /// Compensation failed.
    Dismal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::LockConflict => write!(f, "lock_conflict"),
            Self::NotFound => write!(f, "not_found"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::Internal => write!(f, "internal"),
            Self::Dismal => write!(f, "dismal"),
        }
    }
}

impl FlightError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient(_) => ErrorKind::Transient,
            Self::LockConflict { .. } | Self::JobStillActive { .. } => ErrorKind::LockConflict,
            Self::LockNotHeld { .. }
            | Self::LockNameNotFound { .. }
            | Self::ResourceNotFound(_)
            | Self::FlightNotFound(_) => ErrorKind::NotFound,
            Self::ResourceExists(_)
            | Self::MissingValue(_)
            | Self::UnknownFlightType(_)
            | Self::JobNotComplete(_)
            | Self::Config(_) => ErrorKind::BadRequest,
            Self::Serialization(_) | Self::Shutdown | Self::Internal(_) => ErrorKind::Internal,
            Self::Dismal { .. } => ErrorKind::Dismal,
        }
    }

    /// Returns true if a step failing with this error should be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns a stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transient(_) => "FLIGHT-TRANSIENT",
            Self::LockConflict { .. } => "LOCK-CONFLICT",
            Self::LockNotHeld { .. } => "LOCK-NOT-HELD",
            Self::LockNameNotFound { .. } => "LOCK-NAME-NOT-FOUND",
            Self::JobStillActive { .. } => "LOCK-JOB-ACTIVE",
            Self::ResourceNotFound(_) => "RESOURCE-NOT-FOUND",
            Self::ResourceExists(_) => "RESOURCE-EXISTS",
            Self::MissingValue(_) => "FLIGHT-MISSING-VALUE",
            Self::Serialization(_) => "FLIGHT-SERIALIZATION",
            Self::UnknownFlightType(_) => "FLIGHT-UNKNOWN-TYPE",
            Self::FlightNotFound(_) => "FLIGHT-NOT-FOUND",
            Self::JobNotComplete(_) => "FLIGHT-NOT-COMPLETE",
            Self::Shutdown => "RUNNER-SHUTDOWN",
            Self::Config(_) => "CONFIG-INVALID",
            Self::Internal(_) => "FLIGHT-INTERNAL",
            Self::Dismal { .. } => "FLIGHT-DISMAL",
        }
    }

    /// Builds a serializable description of this error.
    #[must_use]
    pub fn details(&self) -> ErrorDetails {
        let details = ErrorDetails::new(self.code(), self.kind(), self.to_string());
        match self {
            Self::LockConflict { resource, holders } => details
                .with_context("resource", resource)
                .with_context("holders", holders.join(",")),
            Self::LockNotHeld {
                resource,
                lock_name,
            } => details
                .with_context("resource", resource)
                .with_context("lock_name", lock_name),
            Self::LockNameNotFound {
                resource,
                lock_name,
                existing,
            } => details
                .with_context("resource", resource)
                .with_context("lock_name", lock_name)
                .with_context("existing", existing.join(",")),
            Self::JobStillActive {
                lock_name,
                flight_id,
                status,
            } => details
                .with_context("lock_name", lock_name)
                .with_context("flight_id", flight_id)
                .with_context("status", status.to_string()),
            Self::Dismal { step, .. } => details.with_context("step", step),
            _ => details,
        }
    }
}

impl From<serde_json::Error> for FlightError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors reported by resource, lock and storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The conditional update lost a race or the backend is busy; retry.
    #[error("Store contention: {0}")]
    Contention(String),

    /// The row or container does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A row with the same identity or name already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for FlightError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Contention(message) => Self::Transient(message),
            StoreError::NotFound(what) => Self::ResourceNotFound(what),
            StoreError::AlreadyExists(what) => Self::ResourceExists(what),
            StoreError::Backend(message) => Self::Internal(message),
        }
    }
}

/// Serializable description of a [`FlightError`] for job results and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Stable error code (e.g., "LOCK-CONFLICT").
    pub code: String,
    /// Classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Additional context key-value pairs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl ErrorDetails {
    /// Creates new error details.
    #[must_use]
    pub fn new(code: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(FlightError::Transient("deadlock".into()).is_retryable());
        assert!(!FlightError::LockConflict {
            resource: "dataset:1".into(),
            holders: vec!["f1".into()],
        }
        .is_retryable());
        assert!(!FlightError::Internal("bug".into()).is_retryable());
    }

    #[test]
    fn test_lock_conflict_display() {
        let err = FlightError::LockConflict {
            resource: "dataset:abc".into(),
            holders: vec!["f1".into(), "f2".into()],
        };
        assert_eq!(err.to_string(), "Resource dataset:abc is locked by f1, f2");
        assert_eq!(err.kind(), ErrorKind::LockConflict);
    }

    #[test]
    fn test_details_carry_context() {
        let err = FlightError::LockNameNotFound {
            resource: "dataset:abc".into(),
            lock_name: "ghost".into(),
            existing: vec!["f1".into(), "f2".into()],
        };
        let details = err.details();
        assert_eq!(details.code, "LOCK-NAME-NOT-FOUND");
        assert_eq!(details.kind, ErrorKind::NotFound);
        assert_eq!(details.context.get("existing").map(String::as_str), Some("f1,f2"));
    }

    #[test]
    fn test_job_still_active_kind() {
        let err = FlightError::JobStillActive {
            lock_name: "f1".into(),
            flight_id: "f1".into(),
            status: FlightStatus::Running,
        };
        assert_eq!(err.kind(), ErrorKind::LockConflict);
        assert!(err.to_string().contains("still running"));
    }

    #[test]
    fn test_store_contention_maps_to_transient() {
        let err: FlightError = StoreError::Contention("row busy".into()).into();
        assert_eq!(err, FlightError::Transient("row busy".into()));
        assert!(err.is_retryable());

        let err: FlightError = StoreError::NotFound("dataset:1".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: FlightError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, FlightError::Serialization(_)));
    }
}
