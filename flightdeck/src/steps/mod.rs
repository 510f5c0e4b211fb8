//! Step trait and simple implementations.
//!
//! Steps are the fundamental units of work in a flight. Each one has a
//! forward action and a compensating action; both must be idempotent because
//! either may run more than once after a retry or a restart.

use crate::context::FlightContext;
use crate::core::StepResult;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for flight steps.
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Returns the name of the step.
    fn name(&self) -> &str;

    /// Performs the forward action.
    ///
    /// Expected failures are reported through the returned [`StepResult`];
    /// a panic is treated as a fatal internal error.
    async fn do_step(&self, ctx: &FlightContext) -> StepResult;

    /// Reverses the forward action.
    ///
    /// Must succeed when the forward action never ran, partially ran, or
    /// already was undone. The default does nothing, which suits read-only
    /// steps.
    async fn undo_step(&self, _ctx: &FlightContext) -> StepResult {
        StepResult::success()
    }
}

#[async_trait]
impl<S: Step + ?Sized> Step for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        (**self).do_step(ctx).await
    }

    async fn undo_step(&self, ctx: &FlightContext) -> StepResult {
        (**self).undo_step(ctx).await
    }
}

/// A step built from a pair of synchronous closures.
pub struct FnStep<D, U>
where
    D: Fn(&FlightContext) -> StepResult + Send + Sync,
    U: Fn(&FlightContext) -> StepResult + Send + Sync,
{
    name: String,
    do_fn: D,
    undo_fn: U,
}

impl<D> FnStep<D, fn(&FlightContext) -> StepResult>
where
    D: Fn(&FlightContext) -> StepResult + Send + Sync,
{
    /// Creates a step whose undo does nothing.
    pub fn new(name: impl Into<String>, do_fn: D) -> Self {
        Self {
            name: name.into(),
            do_fn,
            undo_fn: |_| StepResult::success(),
        }
    }
}

impl<D, U> FnStep<D, U>
where
    D: Fn(&FlightContext) -> StepResult + Send + Sync,
    U: Fn(&FlightContext) -> StepResult + Send + Sync,
{
    /// Creates a step with both actions.
    pub fn with_undo(name: impl Into<String>, do_fn: D, undo_fn: U) -> Self {
        Self {
            name: name.into(),
            do_fn,
            undo_fn,
        }
    }
}

impl<D, U> Debug for FnStep<D, U>
where
    D: Fn(&FlightContext) -> StepResult + Send + Sync,
    U: Fn(&FlightContext) -> StepResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<D, U> Step for FnStep<D, U>
where
    D: Fn(&FlightContext) -> StepResult + Send + Sync,
    U: Fn(&FlightContext) -> StepResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, ctx: &FlightContext) -> StepResult {
        (self.do_fn)(ctx)
    }

    async fn undo_step(&self, ctx: &FlightContext) -> StepResult {
        (self.undo_fn)(ctx)
    }
}

/// A step that does nothing in either direction.
#[derive(Debug, Clone)]
pub struct NoOpStep {
    name: String,
}

impl NoOpStep {
    /// Creates a new no-op step.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Step for NoOpStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn do_step(&self, _ctx: &FlightContext) -> StepResult {
        StepResult::success()
    }
}
