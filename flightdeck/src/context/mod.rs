//! Flight context management.
//!
//! This module provides:
//! - Flight identity
//! - Typed JSON maps for input parameters and the working map
//! - The per-flight context handed to every step

#[cfg(test)]
mod context_tests;
mod flight_context;
mod id;
pub mod keys;
mod map;

pub use flight_context::FlightContext;
pub use id::FlightId;
pub use map::{FlightMap, WorkingMap};
