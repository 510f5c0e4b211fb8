//! Durable per-flight state: status, progress and outcome.

use crate::context::{FlightContext, FlightId, FlightMap};
use crate::core::{Direction, FlightStatus, StepResult};
use crate::errors::FlightError;
use crate::flight::{FlightOutcome, ProgressRecorder, StepJournal};
use crate::locks::FlightStatusLookup;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Everything the runner keeps about one flight.
///
/// Progress fields are overwritten after every completed step, so a state
/// read after a crash is enough to rebuild the context and resume.
#[derive(Debug, Clone)]
pub struct FlightState {
    /// The flight's id.
    pub flight_id: FlightId,
    /// Registry key the flight was built from.
    pub flight_type: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: FlightStatus,
    /// Parameters the flight was submitted with.
    pub input_parameters: FlightMap,
    /// Working map as of the last recorded step.
    pub working_map: FlightMap,
    /// Next step to run.
    pub step_index: usize,
    /// Direction of travel.
    pub direction: Direction,
    /// The failure that switched the flight to undo.
    pub cause: Option<FlightError>,
    /// Terminal error, set once the flight fails.
    pub error: Option<FlightError>,
    /// When the flight was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the flight reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Step invocations of the latest run.
    pub journal: StepJournal,
}

impl FlightState {
    /// Creates the state of a freshly submitted flight.
    #[must_use]
    pub fn new(
        flight_id: FlightId,
        flight_type: impl Into<String>,
        input_parameters: FlightMap,
    ) -> Self {
        Self {
            flight_id,
            flight_type: flight_type.into(),
            description: None,
            status: FlightStatus::Queued,
            input_parameters,
            working_map: FlightMap::new(),
            step_index: 0,
            direction: Direction::Do,
            cause: None,
            error: None,
            submitted_at: Utc::now(),
            completed_at: None,
            journal: StepJournal::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the recorded progress.
    #[must_use]
    pub fn with_progress(mut self, step_index: usize, direction: Direction) -> Self {
        self.step_index = step_index;
        self.direction = direction;
        self
    }

    /// Sets the working map.
    #[must_use]
    pub fn with_working_map(mut self, working_map: FlightMap) -> Self {
        self.working_map = working_map;
        self
    }

    /// Rebuilds the execution context at the recorded resume point.
    #[must_use]
    pub fn to_context(&self) -> FlightContext {
        let mut ctx = FlightContext::new(self.flight_type.clone(), self.input_parameters.clone())
            .with_flight_id(self.flight_id.clone())
            .with_working_map(self.working_map.clone())
            .with_progress(self.step_index, self.direction);
        if let Some(description) = &self.description {
            ctx = ctx.with_description(description.clone());
        }
        if let Some(cause) = &self.cause {
            ctx = ctx.with_result(StepResult::fatal(cause.clone()));
        }
        ctx
    }
}

/// In-memory table of flight states, one row per flight.
#[derive(Debug, Default)]
pub struct FlightStateStore {
    states: RwLock<HashMap<FlightId, FlightState>>,
}

impl FlightStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a flight's state.
    pub fn insert(&self, state: FlightState) {
        self.states.write().insert(state.flight_id.clone(), state);
    }

    /// Returns a copy of a flight's state.
    #[must_use]
    pub fn get(&self, flight_id: &FlightId) -> Option<FlightState> {
        self.states.read().get(flight_id).cloned()
    }

    /// Updates a flight's status. Returns false if the flight is unknown.
    pub fn set_status(&self, flight_id: &FlightId, status: FlightStatus) -> bool {
        match self.states.write().get_mut(flight_id) {
            Some(state) => {
                state.status = status;
                true
            }
            None => false,
        }
    }

    /// Records a terminal outcome.
    pub fn complete(&self, outcome: &FlightOutcome) {
        if let Some(state) = self.states.write().get_mut(&outcome.flight_id) {
            state.status = outcome.status;
            state.error = outcome.error.clone();
            state.working_map = outcome.working_map.clone();
            state.journal = outcome.journal.clone();
            state.completed_at = Some(Utc::now());
        }
    }

    /// Every flight, oldest submission first.
    #[must_use]
    pub fn list(&self) -> Vec<FlightState> {
        let mut states: Vec<FlightState> = self.states.read().values().cloned().collect();
        states.sort_by_key(|s| s.submitted_at);
        states
    }

    /// Flights that have not reached a terminal status, oldest first.
    #[must_use]
    pub fn non_terminal(&self) -> Vec<FlightState> {
        self.list()
            .into_iter()
            .filter(|s| s.status.is_active())
            .collect()
    }

    /// Number of flights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    /// Returns true if no flight was ever stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl ProgressRecorder for FlightStateStore {
    fn record_progress(&self, ctx: &FlightContext) {
        if let Some(state) = self.states.write().get_mut(ctx.flight_id()) {
            state.status = FlightStatus::Running;
            state.step_index = ctx.step_index();
            state.direction = ctx.direction();
            state.working_map = ctx.working_map().snapshot();
            if ctx.direction() == Direction::Undo {
                state.cause = ctx.result().and_then(|r| r.error.clone());
            }
        }
    }
}

#[async_trait]
impl FlightStatusLookup for FlightStateStore {
    async fn flight_status(
        &self,
        flight_id: &FlightId,
    ) -> Result<Option<FlightStatus>, FlightError> {
        Ok(self.states.read().get(flight_id).map(|s| s.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_round_trips_through_context() {
        let store = FlightStateStore::new();
        let id = FlightId::new("f-1");
        store.insert(
            FlightState::new(id.clone(), "dataset.create", FlightMap::new().with("name", "a"))
                .with_description(Some("create a".into())),
        );

        let ctx = FlightContext::new("dataset.create", FlightMap::new())
            .with_flight_id(id.clone())
            .with_progress(2, Direction::Undo)
            .with_result(StepResult::fatal(FlightError::ResourceExists("a".into())));
        ctx.working_map().put("dataset_id", "d-1").unwrap();
        store.record_progress(&ctx);

        let state = store.get(&id).unwrap();
        assert_eq!(state.status, FlightStatus::Running);
        assert_eq!(state.cause, Some(FlightError::ResourceExists("a".into())));

        let restored = state.to_context();
        assert_eq!(restored.flight_id(), &id);
        assert_eq!(restored.step_index(), 2);
        assert_eq!(restored.direction(), Direction::Undo);
        assert_eq!(restored.description(), Some("create a"));
        assert_eq!(
            restored.working_map().get::<String>("dataset_id").unwrap(),
            Some("d-1".to_string())
        );
        assert!(restored.result().unwrap().is_fatal());
    }

    #[test]
    fn test_status_lookup_and_listing() {
        let store = FlightStateStore::new();
        let a = FlightId::new("a");
        let b = FlightId::new("b");
        store.insert(FlightState::new(a.clone(), "t", FlightMap::new()));
        store.insert(FlightState::new(b.clone(), "t", FlightMap::new()));
        assert!(store.set_status(&b, FlightStatus::Success));
        assert!(!store.set_status(&FlightId::new("c"), FlightStatus::Success));

        assert_eq!(
            tokio_test::block_on(store.flight_status(&a)).unwrap(),
            Some(FlightStatus::Queued)
        );
        assert_eq!(
            tokio_test::block_on(store.flight_status(&FlightId::new("c"))).unwrap(),
            None
        );

        let pending: Vec<_> = store.non_terminal().into_iter().map(|s| s.flight_id).collect();
        assert_eq!(pending, vec![a]);
        assert_eq!(store.len(), 2);
    }
}
