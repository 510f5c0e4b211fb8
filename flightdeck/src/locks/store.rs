//! Storage seams consumed by the lock steps.

use super::{LockAttempt, LockRequest, ResourceId, ResourceLock};
use crate::context::FlightId;
use crate::core::FlightStatus;
use crate::errors::{FlightError, StoreError};
use async_trait::async_trait;
use std::fmt::Debug;

/// A store of per-resource lock state supporting one atomic conditional update.
#[async_trait]
pub trait LockStore: Send + Sync + Debug {
    /// Applies a lock request to the resource row as a single check-and-set.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the row does not exist;
    /// [`StoreError::Contention`] if the update should be retried.
    async fn lock(
        &self,
        resource: &ResourceId,
        request: &LockRequest,
    ) -> Result<LockAttempt, StoreError>;

    /// Releases a lock held under the request's name by the request's flight.
    ///
    /// Returns false if nothing was released, including when the row is gone.
    async fn unlock(&self, resource: &ResourceId, request: &LockRequest)
        -> Result<bool, StoreError>;

    /// Reads the current lock state of a resource.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the row does not exist.
    async fn locks(&self, resource: &ResourceId) -> Result<ResourceLock, StoreError>;
}

/// Looks up the current status of a flight by id.
///
/// This is the only thing the lock protocol needs from the flight runner.
#[async_trait]
pub trait FlightStatusLookup: Send + Sync {
    /// Returns the flight's status, or `None` if the runner has no record of it.
    async fn flight_status(&self, flight_id: &FlightId)
        -> Result<Option<FlightStatus>, FlightError>;
}
