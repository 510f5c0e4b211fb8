//! Step result type with factory methods.

use super::StepStatus;
use crate::errors::FlightError;

/// The outcome of one invocation of a step's `do` or `undo`.
///
/// Steps never raise past their own boundary for expected conditions; they
/// return one of these instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// The outcome class.
    pub status: StepStatus,
    /// The error behind a failure.
    pub error: Option<FlightError>,
    /// Set when an `undo` succeeded without reversing anything.
    pub irreversible: Option<String>,
}

impl Default for StepResult {
    fn default() -> Self {
        Self::success()
    }
}

impl StepResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: StepStatus::Success,
            error: None,
            irreversible: None,
        }
    }

    /// Creates a successful undo result noting that nothing could be reversed.
    ///
    /// An irreversible effect is a property of what happened, not a failure.
    #[must_use]
    pub fn irreversible(note: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Success,
            error: None,
            irreversible: Some(note.into()),
        }
    }

    /// Creates a retryable failure.
    #[must_use]
    pub fn retry(error: FlightError) -> Self {
        Self {
            status: StepStatus::FailureRetry,
            error: Some(error),
            irreversible: None,
        }
    }

    /// Creates a fatal failure.
    #[must_use]
    pub fn fatal(error: FlightError) -> Self {
        Self {
            status: StepStatus::FailureFatal,
            error: Some(error),
            irreversible: None,
        }
    }

    /// Classifies an error: transient errors retry, everything else is fatal.
    #[must_use]
    pub fn from_error(error: FlightError) -> Self {
        if error.is_retryable() {
            Self::retry(error)
        } else {
            Self::fatal(error)
        }
    }

    /// Returns true if the invocation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    /// Returns true if the invocation may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status == StepStatus::FailureRetry
    }

    /// Returns true if the invocation failed permanently.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.status == StepStatus::FailureFatal
    }

    /// Turns a retryable failure into a fatal one, keeping its error.
    #[must_use]
    pub fn escalate(self) -> Self {
        match self.status {
            StepStatus::FailureRetry => Self::fatal(self.error.unwrap_or_else(|| {
                FlightError::Internal("retries exhausted without an error".to_string())
            })),
            _ => self,
        }
    }
}

impl From<FlightError> for StepResult {
    fn from(error: FlightError) -> Self {
        Self::from_error(error)
    }
}

impl From<Result<(), FlightError>> for StepResult {
    fn from(result: Result<(), FlightError>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(error) => Self::from_error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        let result = StepResult::success();
        assert!(result.is_success());
        assert!(result.error.is_none());
        assert!(result.irreversible.is_none());
    }

    #[test]
    fn test_irreversible_is_success() {
        let result = StepResult::irreversible("bucket already deleted");
        assert!(result.is_success());
        assert_eq!(result.irreversible.as_deref(), Some("bucket already deleted"));
    }

    #[test]
    fn test_from_error_classifies() {
        let transient = StepResult::from_error(FlightError::Transient("db busy".into()));
        assert!(transient.is_retryable());

        let missing = StepResult::from_error(FlightError::MissingValue("dataset_id".into()));
        assert!(missing.is_fatal());
    }

    #[test]
    fn test_escalate_keeps_error() {
        let escalated = StepResult::retry(FlightError::Transient("timeout".into())).escalate();
        assert!(escalated.is_fatal());
        assert_eq!(
            escalated.error,
            Some(FlightError::Transient("timeout".into()))
        );

        let fatal = StepResult::fatal(FlightError::Internal("boom".into()));
        assert_eq!(fatal.clone().escalate(), fatal);
    }

    #[test]
    fn test_from_unit_result() {
        assert!(StepResult::from(Ok(())).is_success());
        assert!(StepResult::from(Err(FlightError::Transient("x".into()))).is_retryable());
    }
}
