//! Flights and the execution state machine.
//!
//! A [`Flight`] is an ordered list of steps, each paired with a retry policy.
//! [`FlightExecutor::run`] drives it:
//!
//! ```text
//! READY -> RUNNING(do, i = 0..n-1) -> SUCCESS
//!                                  \-> UNWINDING(undo, i = k..0) -> FATAL | DISMAL_FAILURE
//! ```
//!
//! Undo runs in strict reverse order starting with the failed step itself,
//! and never skips a completed step.

mod builder;
mod executor;
mod journal;
mod outcome;

pub use builder::{Flight, FlightBuilder, FlightStep};
pub use executor::{FlightExecutor, ProgressRecorder};
pub use journal::{StepJournal, StepRecord};
pub use outcome::FlightOutcome;
