//! Flight identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The unique identifier of a flight.
///
/// Lock ownership is recorded by flight id, so the id doubles as the default
/// lock name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightId(String);

impl FlightId {
    /// Wraps an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlightId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FlightId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for FlightId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
