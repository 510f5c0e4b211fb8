//! Static registry from flight type to flight constructor.

use super::{dataset, snapshot, unlock, FlowServices};
use crate::context::FlightMap;
use crate::errors::FlightError;
use crate::flight::Flight;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a flight from its input parameters.
///
/// Constructors validate the inputs they need, so a bad submission fails
/// before anything runs.
pub type FlightFactory =
    Arc<dyn Fn(&FlightMap, &FlowServices) -> Result<Flight, FlightError> + Send + Sync>;

/// Registry of flight constructors keyed by flight type.
///
/// Populated at startup. The runner uses it both for new submissions and to
/// rebuild interrupted flights during recovery.
#[derive(Default)]
pub struct FlightRegistry {
    factories: RwLock<HashMap<String, FlightFactory>>,
}

impl std::fmt::Debug for FlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightRegistry")
            .field("flight_types", &self.flight_types())
            .finish()
    }
}

impl FlightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in flow.
    #[must_use]
    pub fn with_default_flows() -> Self {
        let registry = Self::new();
        registry.register(super::DATASET_CREATE, dataset::create);
        registry.register(super::DATASET_DELETE, dataset::delete);
        registry.register(super::DATASET_INGEST, dataset::ingest);
        registry.register(super::SNAPSHOT_CREATE, snapshot::create);
        registry.register(super::SNAPSHOT_DELETE, snapshot::delete);
        registry.register(super::RESOURCE_UNLOCK, unlock::manual_unlock);
        registry
    }

    /// Registers a constructor, replacing any previous one for the type.
    pub fn register<F>(&self, flight_type: impl Into<String>, factory: F)
    where
        F: Fn(&FlightMap, &FlowServices) -> Result<Flight, FlightError> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(flight_type.into(), Arc::new(factory));
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, flight_type: &str) -> bool {
        self.factories.read().contains_key(flight_type)
    }

    /// Lists registered types, sorted.
    #[must_use]
    pub fn flight_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Builds a flight of the given type.
    ///
    /// # Errors
    ///
    /// [`FlightError::UnknownFlightType`] if nothing is registered for the
    /// type, or whatever the constructor reports for bad inputs.
    pub fn build(
        &self,
        flight_type: &str,
        inputs: &FlightMap,
        services: &FlowServices,
    ) -> Result<Flight, FlightError> {
        let factory = self
            .factories
            .read()
            .get(flight_type)
            .cloned()
            .ok_or_else(|| FlightError::UnknownFlightType(flight_type.to_string()))?;
        factory(inputs, services)
    }
}
