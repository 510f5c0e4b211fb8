//! Administrative unlock.

use super::{FlowServices, JournalStep, SetResponseStep, RESOURCE_UNLOCK};
use crate::context::{keys, FlightMap};
use crate::errors::FlightError;
use crate::flight::{Flight, FlightBuilder};
use crate::locks::{
    CheckJobNotActiveStep, CheckLockNameStep, LockName, ResourceId, ResourceKind,
    UnlockResourceStep,
};
use serde_json::json;

/// Builds `resource.unlock`.
///
/// Inputs: `resource_kind`, `resource_id`, `lock_name`, optional `force`.
/// Releases a lock left behind by another flight after checking that the
/// name exists and that its holder is no longer running.
pub fn manual_unlock(inputs: &FlightMap, services: &FlowServices) -> Result<Flight, FlightError> {
    let kind: ResourceKind = inputs.require(keys::RESOURCE_KIND)?;
    let resource = ResourceId::new(kind, inputs.require(keys::RESOURCE_ID)?);
    inputs.require::<LockName>(keys::LOCK_NAME)?;

    FlightBuilder::new(RESOURCE_UNLOCK)
        .with_default_retry(services.step_retry.clone())
        .step(CheckLockNameStep::new(resource, services.locks.clone()))
        .step(CheckJobNotActiveStep::new(services.status_lookup.clone()))
        .step_with_retry(
            UnlockResourceStep::manual(resource, services.locks.clone()),
            services.lock_retry.clone(),
        )
        .step(JournalStep::new(resource, "unlocked", services.journal.clone()))
        .step(SetResponseStep::new(200, |ctx| {
            Ok(json!({
                "lock_name": ctx.resolve::<String>(keys::LOCK_NAME)?,
                "unlocked": ctx.resolve::<bool>(keys::UNLOCKED)?,
            }))
        }))
        .build()
}
