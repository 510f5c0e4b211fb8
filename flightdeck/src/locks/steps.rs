//! Lock and unlock steps.

use super::{LockAttempt, LockMode, LockName, LockRequest, LockStore, ResourceRef};
use crate::context::{keys, FlightContext, FlightId};
use crate::core::StepResult;
use crate::errors::{FlightError, StoreError};
use crate::steps::Step;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Takes an exclusive or named shared lock on a resource.
///
/// Conflicts are fatal and name the current holders; store contention is
/// retryable. Re-running after the lock was taken by this flight succeeds.
/// Undo releases the lock if this flight holds it and always succeeds.
#[derive(Debug)]
pub struct LockResourceStep {
    name: String,
    resource: ResourceRef,
    mode: LockMode,
    lock_name: Option<LockName>,
    store: Arc<dyn LockStore>,
    retry_on_conflict: bool,
    allow_missing: bool,
}

impl LockResourceStep {
    /// Creates a step taking the exclusive lock.
    #[must_use]
    pub fn exclusive(resource: impl Into<ResourceRef>, store: Arc<dyn LockStore>) -> Self {
        Self::new(resource.into(), LockMode::Exclusive, store)
    }

    /// Creates a step taking a shared lock named after the flight.
    #[must_use]
    pub fn shared(resource: impl Into<ResourceRef>, store: Arc<dyn LockStore>) -> Self {
        Self::new(resource.into(), LockMode::Shared, store)
    }

    fn new(resource: ResourceRef, mode: LockMode, store: Arc<dyn LockStore>) -> Self {
        Self {
            name: format!("lock_{}_{mode}", resource.kind()),
            resource,
            mode,
            lock_name: None,
            store,
            retry_on_conflict: false,
            allow_missing: false,
        }
    }

    /// Names a shared lock explicitly instead of after the flight.
    #[must_use]
    pub fn with_lock_name(mut self, name: impl Into<LockName>) -> Self {
        self.lock_name = Some(name.into());
        self
    }

    /// Overrides the step name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reports conflicts as retryable so the retry policy waits for the holder.
    #[must_use]
    pub fn retry_on_conflict(mut self) -> Self {
        self.retry_on_conflict = true;
        self
    }

    /// Treats a missing resource row as success, for delete flows.
    #[must_use]
    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    fn request(&self, flight_id: &FlightId) -> LockRequest {
        request_for(self.mode, self.lock_name.as_ref(), flight_id)
    }
}

fn request_for(mode: LockMode, lock_name: Option<&LockName>, flight_id: &FlightId) -> LockRequest {
    match mode {
        LockMode::Exclusive => LockRequest::exclusive(flight_id),
        LockMode::Shared => LockRequest::shared(
            lock_name.cloned().unwrap_or_else(|| LockName::from(flight_id)),
            flight_id,
        ),
    }
}

#[async_trait]
impl Step for LockResourceStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        let resource = match self.resource.resolve(ctx) {
            Ok(resource) => resource,
            Err(err) => return StepResult::fatal(err),
        };
        let request = self.request(ctx.flight_id());

        match self.store.lock(&resource, &request).await {
            Ok(LockAttempt::Acquired) => {
                info!(resource = %resource, mode = %self.mode, lock_name = %request.name, "Lock acquired");
                StepResult::success()
            }
            Ok(LockAttempt::AlreadyHeld) => {
                debug!(resource = %resource, lock_name = %request.name, "Lock already held by this flight");
                StepResult::success()
            }
            Ok(LockAttempt::Conflict { holders }) => {
                let error = FlightError::LockConflict {
                    resource: resource.to_string(),
                    holders: holders.iter().map(ToString::to_string).collect(),
                };
                warn!(resource = %resource, error = %error, "Lock conflict");
                if self.retry_on_conflict {
                    StepResult::retry(error)
                } else {
                    StepResult::fatal(error)
                }
            }
            Err(StoreError::NotFound(_)) if self.allow_missing => {
                debug!(resource = %resource, "Resource already absent; nothing to lock");
                StepResult::success()
            }
            Err(err) => StepResult::from_error(err.into()),
        }
    }

    async fn undo_step(&self, ctx: &FlightContext) -> StepResult {
        let Ok(resource) = self.resource.resolve(ctx) else {
            return StepResult::success();
        };
        let request = self.request(ctx.flight_id());

        match self.store.unlock(&resource, &request).await {
            Ok(released) => {
                debug!(resource = %resource, released, "Lock undo");
                StepResult::success()
            }
            Err(StoreError::Contention(message)) => {
                StepResult::retry(FlightError::Transient(message))
            }
            Err(err) => {
                warn!(resource = %resource, error = %err, "Lock release failed during undo");
                StepResult::success()
            }
        }
    }
}

/// Releases a lock taken earlier in the flight, or, in manual mode, one held
/// by the flight recorded in the working map.
///
/// Releasing a lock that is not held succeeds unless `fail_if_not_held` is
/// set. Undo does nothing: a released lock is never re-taken.
#[derive(Debug)]
pub struct UnlockResourceStep {
    name: String,
    resource: ResourceRef,
    mode: LockMode,
    lock_name: Option<LockName>,
    store: Arc<dyn LockStore>,
    fail_if_not_held: bool,
    manual: bool,
}

impl UnlockResourceStep {
    /// Creates a step releasing this flight's exclusive lock.
    #[must_use]
    pub fn exclusive(resource: impl Into<ResourceRef>, store: Arc<dyn LockStore>) -> Self {
        Self::new(resource.into(), LockMode::Exclusive, store, false)
    }

    /// Creates a step releasing this flight's shared lock.
    #[must_use]
    pub fn shared(resource: impl Into<ResourceRef>, store: Arc<dyn LockStore>) -> Self {
        Self::new(resource.into(), LockMode::Shared, store, false)
    }

    /// Creates an administrative step releasing the lock named by the
    /// `lock_name` input on behalf of the holder a [`super::CheckLockNameStep`]
    /// recorded.
    #[must_use]
    pub fn manual(resource: impl Into<ResourceRef>, store: Arc<dyn LockStore>) -> Self {
        Self::new(resource.into(), LockMode::Exclusive, store, true)
    }

    fn new(resource: ResourceRef, mode: LockMode, store: Arc<dyn LockStore>, manual: bool) -> Self {
        let name = if manual {
            format!("unlock_{}_manual", resource.kind())
        } else {
            format!("unlock_{}_{mode}", resource.kind())
        };
        Self {
            name,
            resource,
            mode,
            lock_name: None,
            store,
            fail_if_not_held: false,
            manual,
        }
    }

    /// Names the shared lock explicitly instead of after the flight.
    #[must_use]
    pub fn with_lock_name(mut self, name: impl Into<LockName>) -> Self {
        self.lock_name = Some(name.into());
        self
    }

    /// Overrides the step name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fails fatally when there was no lock to release.
    #[must_use]
    pub fn fail_if_not_held(mut self) -> Self {
        self.fail_if_not_held = true;
        self
    }

    fn request(&self, ctx: &FlightContext) -> Result<LockRequest, FlightError> {
        if !self.manual {
            return Ok(request_for(self.mode, self.lock_name.as_ref(), ctx.flight_id()));
        }
        let name: LockName = ctx.resolve(keys::LOCK_NAME)?;
        let holder: FlightId = ctx.working_map().require(keys::LOCK_HOLDER)?;
        let shared: bool = ctx.working_map().require(keys::IS_SHARED_LOCK)?;
        Ok(if shared {
            LockRequest::shared(name, &holder)
        } else {
            LockRequest::exclusive(&holder)
        })
    }
}

#[async_trait]
impl Step for UnlockResourceStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        let (resource, request) = match self
            .resource
            .resolve(ctx)
            .and_then(|resource| Ok((resource, self.request(ctx)?)))
        {
            Ok(resolved) => resolved,
            Err(err) => return StepResult::fatal(err),
        };

        let released = match self.store.unlock(&resource, &request).await {
            Ok(released) => released,
            Err(err) => return StepResult::from_error(err.into()),
        };

        if self.manual {
            if let Err(err) = ctx.working_map().put(keys::UNLOCKED, &released) {
                return StepResult::fatal(err);
            }
        }

        if released {
            info!(resource = %resource, lock_name = %request.name, holder = %request.flight_id, "Lock released");
            StepResult::success()
        } else if self.fail_if_not_held {
            StepResult::fatal(FlightError::LockNotHeld {
                resource: resource.to_string(),
                lock_name: request.name.to_string(),
            })
        } else {
            debug!(resource = %resource, lock_name = %request.name, "No lock to release");
            StepResult::success()
        }
    }
}
