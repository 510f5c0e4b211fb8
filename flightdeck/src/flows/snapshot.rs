//! Snapshot flows: create and delete.

use super::dataset::delete_resource;
use super::{
    AssignResourceIdStep, CreateResourceRowStep, FlowServices, JournalStep, ProvisionStorageStep,
    SetResponseStep, SNAPSHOT_CREATE, SNAPSHOT_DELETE,
};
use crate::context::{keys, FlightMap};
use crate::errors::FlightError;
use crate::flight::{Flight, FlightBuilder};
use crate::locks::{LockResourceStep, ResourceId, ResourceKind, ResourceRef, UnlockResourceStep};
use serde_json::json;
use uuid::Uuid;

/// Builds `snapshot.create`. Inputs: `dataset_id`, `name`, optional `description`.
///
/// The source dataset is held under a shared lock for the whole flight so it
/// cannot be deleted mid-copy; the new snapshot row is created exclusively
/// locked and released before the dataset.
pub fn create(inputs: &FlightMap, services: &FlowServices) -> Result<Flight, FlightError> {
    let dataset = ResourceId::dataset(inputs.require(keys::DATASET_ID)?);
    inputs.require::<String>(keys::NAME)?;
    let snapshot = ResourceRef::from_context(ResourceKind::Snapshot, keys::SNAPSHOT_ID);

    FlightBuilder::new(SNAPSHOT_CREATE)
        .with_default_retry(services.step_retry.clone())
        .step_with_retry(
            LockResourceStep::shared(dataset, services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step(AssignResourceIdStep::new(ResourceKind::Snapshot, keys::SNAPSHOT_ID))
        .step(
            CreateResourceRowStep::new(snapshot.clone(), services.repository.clone())
                .with_parent(dataset),
        )
        .step(ProvisionStorageStep::new(snapshot.clone(), services.storage.clone()))
        .step_with_retry(
            UnlockResourceStep::exclusive(snapshot.clone(), services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step_with_retry(
            UnlockResourceStep::shared(dataset, services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step(JournalStep::new(snapshot, "created", services.journal.clone()))
        .step(SetResponseStep::new(201, |ctx| {
            Ok(json!({
                "id": ctx.resolve::<Uuid>(keys::SNAPSHOT_ID)?,
                "dataset_id": ctx.resolve::<Uuid>(keys::DATASET_ID)?,
                "name": ctx.resolve::<String>(keys::NAME)?,
            }))
        }))
        .build()
}

/// Builds `snapshot.delete`. Input: `resource_id`.
pub fn delete(inputs: &FlightMap, services: &FlowServices) -> Result<Flight, FlightError> {
    delete_resource(SNAPSHOT_DELETE, ResourceKind::Snapshot, inputs, services)
}
