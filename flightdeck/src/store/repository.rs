//! Resource rows.

use crate::context::FlightId;
use crate::errors::StoreError;
use crate::locks::{ResourceId, ResourceKind, ResourceLock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// The fields needed to create a resource row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    /// The new row's id.
    pub id: ResourceId,
    /// Name, unique per resource kind.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The resource this one was derived from (a snapshot's dataset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceId>,
}

/// One persisted resource row together with its lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// The row's id.
    pub id: ResourceId,
    /// Name, unique per resource kind.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// The resource this one was derived from.
    pub parent: Option<ResourceId>,
    /// The flight that created the row.
    pub created_by: FlightId,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// Current lock state.
    pub locks: ResourceLock,
    /// Rows ingested per batch, keyed by the ingesting flight.
    pub ingests: BTreeMap<String, u64>,
}

impl ResourceRecord {
    /// Creates an unlocked record.
    #[must_use]
    pub fn new(resource: &NewResource, created_by: &FlightId) -> Self {
        Self {
            id: resource.id,
            name: resource.name.clone(),
            description: resource.description.clone(),
            parent: resource.parent,
            created_by: created_by.clone(),
            created_at: Utc::now(),
            locks: ResourceLock::new(),
            ingests: BTreeMap::new(),
        }
    }

    /// Returns the total number of ingested rows.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.ingests.values().sum()
    }
}

/// Persistence for resource rows.
///
/// Every mutating operation is idempotent for a given flight so that a step
/// re-run after a crash converges on the same state.
#[async_trait]
pub trait ResourceRepository: Send + Sync + Debug {
    /// Inserts a row already exclusively locked by `flight_id`.
    ///
    /// Succeeds without change if this flight already created the row.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if another row of the same kind has the
    /// same name, or the id was created by another flight.
    async fn create_and_lock(
        &self,
        resource: &NewResource,
        flight_id: &FlightId,
    ) -> Result<(), StoreError>;

    /// Deletes a row. Returns false if it did not exist.
    async fn delete(&self, id: &ResourceId) -> Result<bool, StoreError>;

    /// Deletes a row only if `flight_id` created it. Returns false otherwise.
    async fn delete_if_created_by(
        &self,
        id: &ResourceId,
        flight_id: &FlightId,
    ) -> Result<bool, StoreError>;

    /// Reads a row.
    async fn get(&self, id: &ResourceId) -> Result<Option<ResourceRecord>, StoreError>;

    /// Lists every row of a kind, sorted by name.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>, StoreError>;

    /// Lists rows of a kind that are not exclusively locked, sorted by name.
    async fn list_available(&self, kind: ResourceKind)
        -> Result<Vec<ResourceRecord>, StoreError>;

    /// Records an ingest batch. Re-recording the same batch replaces it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the row does not exist.
    async fn record_ingest(&self, id: &ResourceId, batch: &str, rows: u64)
        -> Result<(), StoreError>;

    /// Removes an ingest batch. Returns false if it was not recorded.
    async fn remove_ingest(&self, id: &ResourceId, batch: &str) -> Result<bool, StoreError>;
}
