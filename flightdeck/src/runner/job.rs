//! Caller-facing view of flights as jobs.

use super::FlightState;
use crate::context::{keys, FlightId};
use crate::core::FlightStatus;
use crate::errors::FlightError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Coarse job status exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, running or waiting to restart.
    Running,
    /// Every step succeeded.
    Succeeded,
    /// The flight failed, with or without a clean unwind.
    Failed,
}

impl From<FlightStatus> for JobStatus {
    fn from(status: FlightStatus) -> Self {
        match status {
            FlightStatus::Success => Self::Succeeded,
            FlightStatus::Fatal | FlightStatus::DismalFailure => Self::Failed,
            _ => Self::Running,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of one flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    /// The flight id.
    pub id: FlightId,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Registry key the flight was built from.
    pub flight_type: String,
    /// Coarse status.
    pub job_status: JobStatus,
    /// When the flight was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the flight finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobView {
    /// Maps a flight row to its job view.
    #[must_use]
    pub fn from_state(state: &FlightState) -> Self {
        Self {
            id: state.flight_id.clone(),
            description: state.description.clone(),
            flight_type: state.flight_type.clone(),
            job_status: state.status.into(),
            submitted_at: state.submitted_at,
            completed_at: state.completed_at,
        }
    }
}

/// The HTTP-shaped result of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Status code to report.
    pub status_code: u16,
    /// Response body.
    pub response: Value,
}

/// Builds the result of a job from its flight state.
///
/// An active flight yields 202 with its job view as the body. A successful
/// flight yields the stored response and status code, 200 if none was set.
///
/// # Errors
///
/// The terminal error of a failed flight.
pub fn retrieve_job_result(state: &FlightState) -> Result<JobResult, FlightError> {
    match state.status {
        status if status.is_active() => Ok(JobResult {
            status_code: 202,
            response: serde_json::to_value(JobView::from_state(state))?,
        }),
        FlightStatus::Success => Ok(JobResult {
            status_code: state.working_map.get(keys::STATUS_CODE)?.unwrap_or(200),
            response: state
                .working_map
                .get(keys::RESPONSE)?
                .unwrap_or(Value::Null),
        }),
        status => Err(state.error.clone().unwrap_or_else(|| {
            FlightError::Internal(format!(
                "flight {} ended {status} without error",
                state.flight_id
            ))
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FlightMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn state(status: FlightStatus) -> FlightState {
        let mut state = FlightState::new(FlightId::new("f-1"), "dataset.create", FlightMap::new());
        state.status = status;
        state
    }

    #[test]
    fn test_job_status_mapping() {
        assert_eq!(JobStatus::from(FlightStatus::Queued), JobStatus::Running);
        assert_eq!(JobStatus::from(FlightStatus::ReadyToRestart), JobStatus::Running);
        assert_eq!(JobStatus::from(FlightStatus::Success), JobStatus::Succeeded);
        assert_eq!(JobStatus::from(FlightStatus::DismalFailure), JobStatus::Failed);
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_active_flight_is_accepted() {
        let result = retrieve_job_result(&state(FlightStatus::Running)).unwrap();
        assert_eq!(result.status_code, 202);
        assert_eq!(result.response["job_status"], json!("running"));
        assert_eq!(result.response["id"], json!("f-1"));
    }

    #[test]
    fn test_success_uses_stored_response() {
        let mut done = state(FlightStatus::Success);
        done.working_map = FlightMap::new()
            .with(keys::RESPONSE, json!({"id": "d-1"}))
            .with(keys::STATUS_CODE, 201);
        let result = retrieve_job_result(&done).unwrap();
        assert_eq!(result.status_code, 201);
        assert_eq!(result.response, json!({"id": "d-1"}));

        let bare = retrieve_job_result(&state(FlightStatus::Success)).unwrap();
        assert_eq!(bare.status_code, 200);
        assert_eq!(bare.response, Value::Null);
    }

    #[test]
    fn test_failure_returns_error() {
        let mut failed = state(FlightStatus::Fatal);
        failed.error = Some(FlightError::ResourceExists("a".into()));
        assert_eq!(
            retrieve_job_result(&failed).unwrap_err(),
            FlightError::ResourceExists("a".into())
        );
    }
}
