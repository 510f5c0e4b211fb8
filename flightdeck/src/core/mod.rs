//! Core domain model types for flightdeck.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Step status, flight status and direction enums
//! - The step result type with factory methods

mod result;
mod status;

pub use result::StepResult;
pub use status::{Direction, FlightStatus, StepStatus};
