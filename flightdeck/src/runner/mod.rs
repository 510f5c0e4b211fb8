//! Flight runner: submission, execution on a worker pool, and recovery.
//!
//! The runner owns flight lifecycle. Flows and lock steps only see it through
//! [`FlightStatusLookup`](crate::locks::FlightStatusLookup), which
//! [`FlightStateStore`] implements.

mod job;
mod memory;
mod pool;
#[cfg(test)]
mod runner_tests;
mod state_store;

pub use job::{retrieve_job_result, JobResult, JobStatus, JobView};
pub use memory::InMemoryFlightRunner;
pub use pool::WorkerPool;
pub use state_store::{FlightState, FlightStateStore};

use crate::context::{FlightId, FlightMap};
use crate::core::FlightStatus;
use crate::errors::FlightError;
use async_trait::async_trait;

/// Submits flights and reports on them.
#[async_trait]
pub trait FlightRunner: Send + Sync {
    /// Builds a flight of the registered type and queues it.
    async fn submit(&self, flight_type: &str, inputs: FlightMap) -> Result<FlightId, FlightError>;

    /// Returns the current status.
    async fn status(&self, flight_id: &FlightId) -> Result<FlightStatus, FlightError>;

    /// Waits until the flight is terminal and returns its final state.
    async fn wait(&self, flight_id: &FlightId) -> Result<FlightState, FlightError>;

    /// Returns the working map of a successful flight or its error.
    ///
    /// [`FlightError::JobNotComplete`] while the flight is still active.
    async fn result(&self, flight_id: &FlightId) -> Result<FlightMap, FlightError>;
}
