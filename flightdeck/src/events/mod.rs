//! Flight lifecycle hooks.
//!
//! The executor reports every state transition to an [`EventSink`]. Event
//! types are dotted strings; the constants below are the full set.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A flight began executing (or resumed).
pub const FLIGHT_STARTED: &str = "flight.started";
/// A step invocation is about to run.
pub const STEP_STARTED: &str = "step.started";
/// A step invocation finished with a non-retryable result.
pub const STEP_COMPLETED: &str = "step.completed";
/// A step returned a retryable failure and will be invoked again.
pub const STEP_RETRYING: &str = "step.retrying";
/// A `do` failed and the flight began unwinding.
pub const FLIGHT_DIRECTION_SWITCHED: &str = "flight.direction_switched";
/// The flight reached a terminal status.
pub const FLIGHT_COMPLETED: &str = "flight.completed";
