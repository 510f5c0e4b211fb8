//! Testing utilities for flightdeck flights.
//!
//! This module provides:
//! - Mock steps with scripted results and a shared call log
//! - A concurrency probe for worker-pool tests

mod mocks;

pub use mocks::{call_log, CallLog, ConcurrencyProbe, MockStep};
