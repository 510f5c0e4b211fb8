//! Step status, flight status and execution direction enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome class of a single `do` or `undo` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step completed; move on.
    Success,
    /// The step failed transiently; the retry policy decides what happens next.
    FailureRetry,
    /// The step failed permanently; no retries are attempted.
    FailureFatal,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::FailureRetry => write!(f, "failure_retry"),
            Self::FailureFatal => write!(f, "failure_fatal"),
        }
    }
}

/// The lifecycle status of a flight as reported by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    /// Submitted, waiting for a worker.
    Queued,
    /// Built and about to start.
    Ready,
    /// Steps are executing (in either direction).
    Running,
    /// Parked waiting on an external event.
    Waiting,
    /// Interrupted and scheduled to resume from its last recorded step.
    ReadyToRestart,
    /// Every step's `do` succeeded.
    Success,
    /// A `do` failed and every completed step was undone.
    Fatal,
    /// An `undo` failed; resource state is not guaranteed consistent.
    DismalFailure,
}

impl Default for FlightStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Waiting => write!(f, "waiting"),
            Self::ReadyToRestart => write!(f, "ready_to_restart"),
            Self::Success => write!(f, "success"),
            Self::Fatal => write!(f, "fatal"),
            Self::DismalFailure => write!(f, "dismal_failure"),
        }
    }
}

impl FlightStatus {
    /// Returns true while the flight may still mutate resources.
    ///
    /// A lock held by an active flight must never be removed manually.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Queued | Self::Ready | Self::Running | Self::Waiting | Self::ReadyToRestart
        )
    }

    /// Returns true once the flight can make no further progress.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the flight finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The direction a flight is moving through its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Running `do` actions forward.
    Do,
    /// Running `undo` actions backward.
    Undo,
}

impl Default for Direction {
    fn default() -> Self {
        Self::Do
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Do => write!(f, "do"),
            Self::Undo => write!(f, "undo"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_status_display() {
        assert_eq!(StepStatus::Success.to_string(), "success");
        assert_eq!(StepStatus::FailureRetry.to_string(), "failure_retry");
        assert_eq!(StepStatus::FailureFatal.to_string(), "failure_fatal");
    }

    #[test]
    fn test_flight_status_active_set() {
        for status in [
            FlightStatus::Queued,
            FlightStatus::Ready,
            FlightStatus::Running,
            FlightStatus::Waiting,
            FlightStatus::ReadyToRestart,
        ] {
            assert!(status.is_active(), "{status} should be active");
        }

        for status in [
            FlightStatus::Success,
            FlightStatus::Fatal,
            FlightStatus::DismalFailure,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn test_flight_status_serialize() {
        let json = serde_json::to_string(&FlightStatus::ReadyToRestart).unwrap();
        assert_eq!(json, r#""ready_to_restart""#);

        let deserialized: FlightStatus = serde_json::from_str(r#""dismal_failure""#).unwrap();
        assert_eq!(deserialized, FlightStatus::DismalFailure);
    }

    #[test]
    fn test_direction_default() {
        assert_eq!(Direction::default(), Direction::Do);
        assert_eq!(Direction::Undo.to_string(), "undo");
    }
}
