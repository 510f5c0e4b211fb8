//! Dataset flows: create, delete and ingest.

use super::{
    AssignResourceIdStep, CreateResourceRowStep, DeleteResourceRowStep, DeleteStorageStep,
    FlowServices, JournalStep, ProvisionStorageStep, SetResponseStep, WriteRowsStep,
    DATASET_CREATE, DATASET_DELETE, DATASET_INGEST,
};
use crate::context::{keys, FlightMap};
use crate::errors::FlightError;
use crate::flight::{Flight, FlightBuilder};
use crate::locks::{LockResourceStep, ResourceId, ResourceKind, ResourceRef, UnlockResourceStep};
use serde_json::json;
use uuid::Uuid;

/// Builds `dataset.create`.
///
/// Inputs: `name`, optional `description`. The row is inserted already
/// locked, so no separate lock step runs first.
pub fn create(inputs: &FlightMap, services: &FlowServices) -> Result<Flight, FlightError> {
    inputs.require::<String>(keys::NAME)?;
    let dataset = ResourceRef::from_context(ResourceKind::Dataset, keys::DATASET_ID);

    FlightBuilder::new(DATASET_CREATE)
        .with_default_retry(services.step_retry.clone())
        .step(AssignResourceIdStep::new(ResourceKind::Dataset, keys::DATASET_ID))
        .step(CreateResourceRowStep::new(dataset.clone(), services.repository.clone()))
        .step(ProvisionStorageStep::new(dataset.clone(), services.storage.clone()))
        .step_with_retry(
            UnlockResourceStep::exclusive(dataset.clone(), services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step(JournalStep::new(dataset, "created", services.journal.clone()))
        .step(SetResponseStep::new(201, |ctx| {
            Ok(json!({
                "id": ctx.resolve::<Uuid>(keys::DATASET_ID)?,
                "name": ctx.resolve::<String>(keys::NAME)?,
            }))
        }))
        .build()
}

/// Builds `dataset.delete`. Input: `resource_id`.
pub fn delete(inputs: &FlightMap, services: &FlowServices) -> Result<Flight, FlightError> {
    delete_resource(DATASET_DELETE, ResourceKind::Dataset, inputs, services)
}

/// Builds `dataset.ingest`. Inputs: `dataset_id`, `rows` (array).
///
/// Ingests hold a shared lock named after the flight, so several may run at
/// once while deletes are kept out.
pub fn ingest(inputs: &FlightMap, services: &FlowServices) -> Result<Flight, FlightError> {
    let dataset = ResourceId::dataset(inputs.require(keys::DATASET_ID)?);
    inputs.require::<Vec<serde_json::Value>>(keys::ROWS)?;

    FlightBuilder::new(DATASET_INGEST)
        .with_default_retry(services.step_retry.clone())
        .step_with_retry(
            LockResourceStep::shared(dataset, services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step(WriteRowsStep::new(
            dataset,
            services.storage.clone(),
            services.repository.clone(),
        ))
        .step_with_retry(
            UnlockResourceStep::shared(dataset, services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step(JournalStep::new(dataset, "ingested", services.journal.clone()))
        .step(SetResponseStep::new(200, |ctx| {
            Ok(json!({
                "dataset_id": ctx.resolve::<Uuid>(keys::DATASET_ID)?,
                "row_count": ctx.resolve::<u64>(keys::ROW_COUNT)?,
            }))
        }))
        .build()
}

/// Shared shape of the delete flows.
///
/// The lock step tolerates a missing row so that deleting something already
/// gone, or re-running an interrupted delete, succeeds.
pub(super) fn delete_resource(
    flight_type: &str,
    kind: ResourceKind,
    inputs: &FlightMap,
    services: &FlowServices,
) -> Result<Flight, FlightError> {
    let resource = ResourceId::new(kind, inputs.require(keys::RESOURCE_ID)?);

    FlightBuilder::new(flight_type)
        .with_default_retry(services.step_retry.clone())
        .step_with_retry(
            LockResourceStep::exclusive(resource, services.locks.clone()).allow_missing(),
            services.lock_retry.clone(),
        )
        .step(DeleteStorageStep::new(resource, services.storage.clone()))
        .step(DeleteResourceRowStep::new(resource, services.repository.clone()))
        .step_with_retry(
            UnlockResourceStep::exclusive(resource, services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step(JournalStep::new(resource, "deleted", services.journal.clone()))
        .step(SetResponseStep::new(200, |ctx| {
            Ok(json!({
                "id": ctx.resolve::<Uuid>(keys::RESOURCE_ID)?,
                "delete_outcome": ctx.resolve::<String>(keys::DELETE_OUTCOME)?,
            }))
        }))
        .build()
}
