//! The per-flight execution context handed to every step.

use super::{FlightId, FlightMap, WorkingMap};
use crate::core::{Direction, StepResult};
use crate::errors::FlightError;
use serde::de::DeserializeOwned;

/// Everything a step can see about the flight it belongs to.
///
/// The context lives for the whole flight. Input parameters are read-only;
/// the working map accumulates values written by steps; the step index and
/// direction record progress so that an interrupted flight can resume.
#[derive(Debug, Clone)]
pub struct FlightContext {
    flight_id: FlightId,
    flight_type: String,
    description: Option<String>,
    input_parameters: FlightMap,
    working_map: WorkingMap,
    step_index: usize,
    direction: Direction,
    result: Option<StepResult>,
}

impl FlightContext {
    /// Creates a context for a new flight with a generated id.
    #[must_use]
    pub fn new(flight_type: impl Into<String>, input_parameters: FlightMap) -> Self {
        Self {
            flight_id: FlightId::generate(),
            flight_type: flight_type.into(),
            description: None,
            input_parameters,
            working_map: WorkingMap::new(),
            step_index: 0,
            direction: Direction::Do,
            result: None,
        }
    }

    /// Sets the flight id.
    #[must_use]
    pub fn with_flight_id(mut self, flight_id: FlightId) -> Self {
        self.flight_id = flight_id;
        self
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restores previously persisted working-map contents.
    #[must_use]
    pub fn with_working_map(mut self, map: FlightMap) -> Self {
        self.working_map = WorkingMap::from_map(map);
        self
    }

    /// Restores recorded progress so execution resumes where it stopped.
    #[must_use]
    pub fn with_progress(mut self, step_index: usize, direction: Direction) -> Self {
        self.step_index = step_index;
        self.direction = direction;
        self
    }

    /// Restores the result that switched a persisted flight to undo.
    #[must_use]
    pub fn with_result(mut self, result: StepResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Returns the flight id.
    #[must_use]
    pub fn flight_id(&self) -> &FlightId {
        &self.flight_id
    }

    /// Returns the flight type.
    #[must_use]
    pub fn flight_type(&self) -> &str {
        &self.flight_type
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the read-only input parameters.
    #[must_use]
    pub fn input_parameters(&self) -> &FlightMap {
        &self.input_parameters
    }

    /// Returns the shared working map.
    #[must_use]
    pub fn working_map(&self) -> &WorkingMap {
        &self.working_map
    }

    /// Returns the index of the current step.
    #[must_use]
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Returns the current direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the result that switched the flight to undo, or the final result.
    #[must_use]
    pub fn result(&self) -> Option<&StepResult> {
        self.result.as_ref()
    }

    /// Reads a required value, preferring the working map over the inputs.
    pub fn resolve<T: DeserializeOwned>(&self, key: &str) -> Result<T, FlightError> {
        if let Some(value) = self.working_map.get(key)? {
            return Ok(value);
        }
        self.input_parameters.require(key)
    }

    /// Reads an optional input parameter.
    pub fn input<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FlightError> {
        self.input_parameters.get(key)
    }

    pub(crate) fn set_step_index(&mut self, step_index: usize) {
        self.step_index = step_index;
    }

    pub(crate) fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub(crate) fn set_result(&mut self, result: StepResult) {
        self.result = Some(result);
    }
}
