//! The terminal result of running a flight.

use super::StepJournal;
use crate::context::{keys, FlightId, FlightMap};
use crate::core::FlightStatus;
use crate::errors::FlightError;
use serde::de::DeserializeOwned;

/// What a flight run produced.
#[derive(Debug, Clone)]
pub struct FlightOutcome {
    /// The flight that ran.
    pub flight_id: FlightId,
    /// Terminal status: success, fatal or dismal failure.
    pub status: FlightStatus,
    /// The failing `do` error for fatal flights, the undo error for dismal ones.
    pub error: Option<FlightError>,
    /// The working map as the last step left it.
    pub working_map: FlightMap,
    /// Every step invocation made during this run.
    pub journal: StepJournal,
}

impl FlightOutcome {
    /// Returns true if every step's `do` succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Reads the response payload a flow stored in the working map.
    pub fn response<T: DeserializeOwned>(&self) -> Result<Option<T>, FlightError> {
        self.working_map.get(keys::RESPONSE)
    }

    /// Converts the outcome into the working map or the flight's error.
    pub fn into_result(self) -> Result<FlightMap, FlightError> {
        match self.status {
            FlightStatus::Success => Ok(self.working_map),
            status => Err(self.error.unwrap_or_else(|| {
                FlightError::Internal(format!("flight {} ended {status} without error", self.flight_id))
            })),
        }
    }
}
