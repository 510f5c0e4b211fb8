//! Steps that create, provision, fill and delete resources.
//!
//! Each step calls one backend operation and turns its error into a
//! [`StepResult`]. Deletes treat an absent resource as success.

use crate::context::{keys, FlightContext};
use crate::core::StepResult;
use crate::errors::FlightError;
use crate::locks::{ResourceKind, ResourceRef};
use crate::steps::Step;
use crate::store::{Journal, NewResource, ResourceRepository, StorageDriver};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Value of `delete_outcome` when the delete removed a row.
pub const DELETED: &str = "deleted";
/// Value of `delete_outcome` when there was nothing to delete.
pub const NOT_FOUND: &str = "not_found";

/// Generates the id of a resource about to be created.
///
/// Re-running keeps an id already in the working map.
#[derive(Debug)]
pub struct AssignResourceIdStep {
    name: String,
    key: &'static str,
}

impl AssignResourceIdStep {
    /// Creates the step storing a fresh id under `key`.
    #[must_use]
    pub fn new(kind: ResourceKind, key: &'static str) -> Self {
        Self {
            name: format!("assign_{kind}_id"),
            key,
        }
    }
}

#[async_trait]
impl Step for AssignResourceIdStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        if ctx.working_map().contains_key(self.key) {
            return StepResult::success();
        }
        let id = Uuid::new_v4();
        debug!(key = self.key, id = %id, "Assigned resource id");
        ctx.working_map().put(self.key, &id).into()
    }
}

/// Inserts the resource row already locked by this flight.
///
/// Name and description come from the `name` and `description` inputs.
/// Undo deletes the row only if this flight created it.
#[derive(Debug)]
pub struct CreateResourceRowStep {
    name: String,
    resource: ResourceRef,
    parent: Option<ResourceRef>,
    repository: Arc<dyn ResourceRepository>,
}

impl CreateResourceRowStep {
    /// Creates the step.
    #[must_use]
    pub fn new(resource: impl Into<ResourceRef>, repository: Arc<dyn ResourceRepository>) -> Self {
        let resource = resource.into();
        Self {
            name: format!("create_{}_row", resource.kind()),
            resource,
            parent: None,
            repository,
        }
    }

    /// Records the resource this one is derived from.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<ResourceRef>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    async fn create(&self, ctx: &FlightContext) -> Result<(), FlightError> {
        let id = self.resource.resolve(ctx)?;
        let parent = self.parent.as_ref().map(|p| p.resolve(ctx)).transpose()?;
        let resource = NewResource {
            id,
            name: ctx.resolve(keys::NAME)?,
            description: ctx.input(keys::DESCRIPTION)?,
            parent,
        };
        self.repository
            .create_and_lock(&resource, ctx.flight_id())
            .await?;
        info!(resource = %id, name = %resource.name, "Resource row created and locked");
        Ok(())
    }
}

#[async_trait]
impl Step for CreateResourceRowStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        self.create(ctx).await.into()
    }

    async fn undo_step(&self, ctx: &FlightContext) -> StepResult {
        let Ok(id) = self.resource.resolve(ctx) else {
            return StepResult::success();
        };
        match self.repository.delete_if_created_by(&id, ctx.flight_id()).await {
            Ok(deleted) => {
                debug!(resource = %id, deleted, "Resource row undo");
                StepResult::success()
            }
            Err(err) => StepResult::from_error(err.into()),
        }
    }
}

/// Creates the storage container of a resource.
#[derive(Debug)]
pub struct ProvisionStorageStep {
    name: String,
    resource: ResourceRef,
    storage: Arc<dyn StorageDriver>,
}

impl ProvisionStorageStep {
    /// Creates the step.
    #[must_use]
    pub fn new(resource: impl Into<ResourceRef>, storage: Arc<dyn StorageDriver>) -> Self {
        let resource = resource.into();
        Self {
            name: format!("provision_{}_storage", resource.kind()),
            resource,
            storage,
        }
    }
}

#[async_trait]
impl Step for ProvisionStorageStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        let id = match self.resource.resolve(ctx) {
            Ok(id) => id,
            Err(err) => return StepResult::fatal(err),
        };
        match self.storage.create_container(&id).await {
            Ok(container) => {
                info!(resource = %id, container = %container, "Storage provisioned");
                StepResult::success()
            }
            Err(err) => StepResult::from_error(err.into()),
        }
    }

    async fn undo_step(&self, ctx: &FlightContext) -> StepResult {
        let Ok(id) = self.resource.resolve(ctx) else {
            return StepResult::success();
        };
        match self.storage.delete_container(&id).await {
            Ok(_) => StepResult::success(),
            Err(err) => StepResult::from_error(err.into()),
        }
    }
}

/// Deletes the storage container of a resource.
///
/// Deleted data cannot be restored, so undo is irreversible.
#[derive(Debug)]
pub struct DeleteStorageStep {
    name: String,
    resource: ResourceRef,
    storage: Arc<dyn StorageDriver>,
}

impl DeleteStorageStep {
    /// Creates the step.
    #[must_use]
    pub fn new(resource: impl Into<ResourceRef>, storage: Arc<dyn StorageDriver>) -> Self {
        let resource = resource.into();
        Self {
            name: format!("delete_{}_storage", resource.kind()),
            resource,
            storage,
        }
    }
}

#[async_trait]
impl Step for DeleteStorageStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        let id = match self.resource.resolve(ctx) {
            Ok(id) => id,
            Err(err) => return StepResult::fatal(err),
        };
        match self.storage.delete_container(&id).await {
            Ok(true) => {
                info!(resource = %id, "Storage deleted");
                StepResult::success()
            }
            Ok(false) => {
                debug!(resource = %id, "Storage already absent");
                StepResult::success()
            }
            Err(err) => StepResult::from_error(err.into()),
        }
    }

    async fn undo_step(&self, _ctx: &FlightContext) -> StepResult {
        StepResult::irreversible("deleted storage cannot be restored")
    }
}

/// Deletes the resource row, recording whether anything was there.
#[derive(Debug)]
pub struct DeleteResourceRowStep {
    name: String,
    resource: ResourceRef,
    repository: Arc<dyn ResourceRepository>,
}

impl DeleteResourceRowStep {
    /// Creates the step.
    #[must_use]
    pub fn new(resource: impl Into<ResourceRef>, repository: Arc<dyn ResourceRepository>) -> Self {
        let resource = resource.into();
        Self {
            name: format!("delete_{}_row", resource.kind()),
            resource,
            repository,
        }
    }

    async fn delete(&self, ctx: &FlightContext) -> Result<(), FlightError> {
        let id = self.resource.resolve(ctx)?;
        let outcome = if self.repository.delete(&id).await? {
            info!(resource = %id, "Resource row deleted");
            DELETED
        } else {
            debug!(resource = %id, "Resource row already absent");
            NOT_FOUND
        };
        ctx.working_map().put(keys::DELETE_OUTCOME, outcome)
    }
}

#[async_trait]
impl Step for DeleteResourceRowStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        self.delete(ctx).await.into()
    }

    async fn undo_step(&self, _ctx: &FlightContext) -> StepResult {
        StepResult::irreversible("deleted resource row cannot be restored")
    }
}

/// Writes the `rows` input into a dataset as one batch keyed by the flight id.
///
/// The row count is stored under `row_count`. Undo removes the batch.
#[derive(Debug)]
pub struct WriteRowsStep {
    resource: ResourceRef,
    storage: Arc<dyn StorageDriver>,
    repository: Arc<dyn ResourceRepository>,
}

impl WriteRowsStep {
    /// Creates the step.
    #[must_use]
    pub fn new(
        resource: impl Into<ResourceRef>,
        storage: Arc<dyn StorageDriver>,
        repository: Arc<dyn ResourceRepository>,
    ) -> Self {
        Self {
            resource: resource.into(),
            storage,
            repository,
        }
    }

    async fn write(&self, ctx: &FlightContext) -> Result<(), FlightError> {
        let id = self.resource.resolve(ctx)?;
        let rows: Vec<serde_json::Value> = ctx.resolve(keys::ROWS)?;
        let batch = ctx.flight_id().as_str();

        let written = self.storage.write_rows(&id, batch, &rows).await?;
        self.repository.record_ingest(&id, batch, written).await?;
        info!(resource = %id, rows = written, "Rows ingested");
        ctx.working_map().put(keys::ROW_COUNT, &written)
    }

    async fn revert(&self, ctx: &FlightContext) -> Result<(), FlightError> {
        let Ok(id) = self.resource.resolve(ctx) else {
            return Ok(());
        };
        let batch = ctx.flight_id().as_str();
        self.storage.delete_rows(&id, batch).await?;
        self.repository.remove_ingest(&id, batch).await?;
        Ok(())
    }
}

#[async_trait]
impl Step for WriteRowsStep {
    fn name(&self) -> &str {
        "write_rows"
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        self.write(ctx).await.into()
    }

    async fn undo_step(&self, ctx: &FlightContext) -> StepResult {
        self.revert(ctx).await.into()
    }
}

/// Appends an entry to the mutation journal. Undo removes it.
#[derive(Debug)]
pub struct JournalStep {
    name: String,
    resource: ResourceRef,
    action: &'static str,
    journal: Arc<Journal>,
}

impl JournalStep {
    /// Creates the step.
    #[must_use]
    pub fn new(resource: impl Into<ResourceRef>, action: &'static str, journal: Arc<Journal>) -> Self {
        Self {
            name: format!("journal_{action}"),
            resource: resource.into(),
            action,
            journal,
        }
    }
}

#[async_trait]
impl Step for JournalStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        let id = match self.resource.resolve(ctx) {
            Ok(id) => id,
            Err(err) => return StepResult::fatal(err),
        };
        let note = ctx.description().map(ToString::to_string);
        self.journal.record(ctx.flight_id(), &id, self.action, note);
        StepResult::success()
    }

    async fn undo_step(&self, ctx: &FlightContext) -> StepResult {
        if let Ok(id) = self.resource.resolve(ctx) {
            self.journal.remove(ctx.flight_id(), &id, self.action);
        }
        StepResult::success()
    }
}

/// Builds a flight's response payload from its context.
pub type ResponseFn = fn(&FlightContext) -> Result<serde_json::Value, FlightError>;

/// Stores the flight's response payload and status code in the working map.
pub struct SetResponseStep {
    status_code: u16,
    build: ResponseFn,
}

impl std::fmt::Debug for SetResponseStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetResponseStep")
            .field("status_code", &self.status_code)
            .finish_non_exhaustive()
    }
}

impl SetResponseStep {
    /// Creates the step.
    #[must_use]
    pub fn new(status_code: u16, build: ResponseFn) -> Self {
        Self { status_code, build }
    }

    fn respond(&self, ctx: &FlightContext) -> Result<(), FlightError> {
        let response = (self.build)(ctx)?;
        ctx.working_map().put(keys::RESPONSE, &response)?;
        ctx.working_map().put(keys::STATUS_CODE, &self.status_code)
    }
}

#[async_trait]
impl Step for SetResponseStep {
    fn name(&self) -> &str {
        "set_response"
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        self.respond(ctx).into()
    }
}
