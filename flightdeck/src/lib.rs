//! # Flightdeck
//!
//! Saga-style flight orchestration and resource locking for long-running,
//! multi-step data operations.
//!
//! Flightdeck provides:
//!
//! - **Steps**: idempotent units of work with a forward action and a compensating action
//! - **Retry policies**: fixed, exponential and pool-scaled random backoff
//! - **Flights**: ordered step pipelines that unwind in strict reverse order on failure
//! - **Resource locks**: exclusive and named-shared locks taken and released as ordinary steps
//! - **Runner**: an in-process flight runner with a bounded worker pool and crash recovery
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flightdeck::prelude::*;
//!
//! let flight = FlightBuilder::new("dataset.delete")
//!     .step_with_retry(LockResourceStep::exclusive(dataset.clone(), locks.clone()), lock_retry.clone())
//!     .step(DeleteResourceRowStep::new(dataset.clone(), repository.clone()))
//!     .step_with_retry(UnlockResourceStep::exclusive(dataset, locks), lock_retry)
//!     .build()?;
//!
//! let mut ctx = FlightContext::new("dataset.delete", FlightMap::new());
//! let outcome = FlightExecutor::new().run(&flight, &mut ctx).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod flight;
pub mod flows;
pub mod locks;
pub mod observability;
pub mod retry;
pub mod runner;
pub mod steps;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{FlightdeckConfig, RetryConfig, RetryKind, RunnerConfig};
    pub use crate::context::{keys, FlightContext, FlightId, FlightMap, WorkingMap};
    pub use crate::core::{Direction, FlightStatus, StepResult, StepStatus};
    pub use crate::errors::{ErrorDetails, ErrorKind, FlightError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::flight::{
        Flight, FlightBuilder, FlightExecutor, FlightOutcome, StepJournal, StepRecord,
    };
    pub use crate::flows::{
        AssignResourceIdStep, CreateResourceRowStep, DeleteResourceRowStep, DeleteStorageStep,
        FlightRegistry, FlowServices, JournalStep, ProvisionStorageStep, SetResponseStep,
        WriteRowsStep,
    };
    pub use crate::locks::{
        CheckJobNotActiveStep, CheckLockNameStep, FlightStatusLookup, LockMode, LockName,
        LockResourceStep, LockStore, ResourceId, ResourceKind, ResourceLock, ResourceRef,
        UnlockResourceStep,
    };
    pub use crate::retry::{JitterStrategy, RetryDecision, RetryPolicy, RetryState};
    pub use crate::runner::{
        FlightRunner, FlightState, FlightStateStore, InMemoryFlightRunner, JobResult, JobStatus,
        JobView,
    };
    pub use crate::steps::{FnStep, NoOpStep, Step};
    pub use crate::store::{
        InMemoryResourceStore, InMemoryStorageDriver, Journal, ResourceRepository, StorageDriver,
    };
}
