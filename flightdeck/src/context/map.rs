//! Flight maps: input parameters and the shared working map.

use crate::errors::FlightError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A string-keyed map of JSON values with typed accessors.
///
/// Used for a flight's read-only input parameters and as the backing store of
/// its [`WorkingMap`]. Values must round-trip through JSON so that a flight can
/// be persisted and resumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightMap {
    entries: BTreeMap<String, serde_json::Value>,
}

impl FlightMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Serializes and stores a value, replacing any previous one.
    pub fn put<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), FlightError> {
        self.entries.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Stores a raw JSON value.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    /// Returns the raw JSON value for a key.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    /// Reads and deserializes a value; `Ok(None)` if the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FlightError> {
        self.entries
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(|e| FlightError::Serialization(format!("{key}: {e}")))
    }

    /// Reads a value that must be present.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, FlightError> {
        self.get(key)?
            .ok_or_else(|| FlightError::MissingValue(key.to_string()))
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes a key, returning its raw value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.entries.remove(key)
    }

    /// Returns all keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, serde_json::Value)> for FlightMap {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// The mutable key-value store shared by all steps of one flight.
///
/// Steps receive the flight context by shared reference, so writes go through
/// an interior lock. Values written by a step are visible to every later step
/// and to every undo.
#[derive(Debug, Default)]
pub struct WorkingMap {
    data: RwLock<FlightMap>,
}

impl WorkingMap {
    /// Creates an empty working map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a working map from persisted contents.
    #[must_use]
    pub fn from_map(map: FlightMap) -> Self {
        Self {
            data: RwLock::new(map),
        }
    }

    /// Serializes and stores a value, replacing any previous one.
    pub fn put<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), FlightError> {
        self.data.write().put(key, value)
    }

    /// Reads and deserializes a value; `Ok(None)` if the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FlightError> {
        self.data.read().get(key)
    }

    /// Reads a value that must be present.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, FlightError> {
        self.data.read().require(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Removes a key.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> FlightMap {
        self.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Clone for WorkingMap {
    fn clone(&self) -> Self {
        Self::from_map(self.snapshot())
    }
}
