//! Safety checks that guard an administrative unlock.

use super::{FlightStatusLookup, LockMode, LockName, LockStore, ResourceRef};
use crate::context::{keys, FlightContext, FlightId};
use crate::core::StepResult;
use crate::errors::FlightError;
use crate::steps::Step;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Verifies that the lock named by the `lock_name` input exists on the resource.
///
/// Matching is exact. On success the holder's flight id and whether the lock
/// is shared are recorded in the working map for the steps that follow.
#[derive(Debug)]
pub struct CheckLockNameStep {
    resource: ResourceRef,
    store: Arc<dyn LockStore>,
}

impl CheckLockNameStep {
    /// Creates the check.
    #[must_use]
    pub fn new(resource: impl Into<ResourceRef>, store: Arc<dyn LockStore>) -> Self {
        Self {
            resource: resource.into(),
            store,
        }
    }

    async fn check(&self, ctx: &FlightContext) -> Result<(), FlightError> {
        let resource = self.resource.resolve(ctx)?;
        let name: LockName = ctx.resolve(keys::LOCK_NAME)?;
        let locks = self.store.locks(&resource).await?;

        let Some((holder, mode)) = locks.holder_of(&name) else {
            return Err(FlightError::LockNameNotFound {
                resource: resource.to_string(),
                lock_name: name.to_string(),
                existing: locks.lock_names().iter().map(ToString::to_string).collect(),
            });
        };

        ctx.working_map().put(keys::LOCK_HOLDER, &holder)?;
        ctx.working_map()
            .put(keys::IS_SHARED_LOCK, &(mode == LockMode::Shared))?;
        Ok(())
    }
}

#[async_trait]
impl Step for CheckLockNameStep {
    fn name(&self) -> &str {
        "check_lock_name"
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        self.check(ctx).await.into()
    }
}

/// Refuses to proceed while the flight holding the lock may still be running.
///
/// An active holder (queued, ready, running, waiting, ready to restart) fails
/// the flight fatally unless forced, either at construction or through the
/// `force` input. A holder the runner has no record of counts as inactive.
pub struct CheckJobNotActiveStep {
    lookup: Arc<dyn FlightStatusLookup>,
    force: bool,
}

impl std::fmt::Debug for CheckJobNotActiveStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckJobNotActiveStep")
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

impl CheckJobNotActiveStep {
    /// Creates the check.
    #[must_use]
    pub fn new(lookup: Arc<dyn FlightStatusLookup>) -> Self {
        Self {
            lookup,
            force: false,
        }
    }

    /// Skips the check regardless of inputs.
    #[must_use]
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    async fn check(&self, ctx: &FlightContext) -> Result<(), FlightError> {
        let holder: FlightId = ctx.working_map().require(keys::LOCK_HOLDER)?;
        let forced = self.force || ctx.input::<bool>(keys::FORCE)?.unwrap_or(false);
        if forced {
            warn!(holder = %holder, "Skipping active-holder check on forced unlock");
            return Ok(());
        }

        match self.lookup.flight_status(&holder).await? {
            Some(status) if status.is_active() => Err(FlightError::JobStillActive {
                lock_name: ctx.resolve::<String>(keys::LOCK_NAME).unwrap_or_default(),
                flight_id: holder.to_string(),
                status,
            }),
            Some(_) => Ok(()),
            None => {
                info!(holder = %holder, "Lock holder flight is unknown; treating it as inactive");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Step for CheckJobNotActiveStep {
    fn name(&self) -> &str {
        "check_job_not_active"
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        self.check(ctx).await.into()
    }
}
