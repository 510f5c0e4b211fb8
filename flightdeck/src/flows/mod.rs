//! Business flights built from locking and resource steps.
//!
//! Every mutating flow takes a lock first, releases it near the end, then
//! journals the change and sets the response:
//!
//! | flight type        | steps |
//! |--------------------|-------|
//! | `dataset.create`   | assign id, create row + lock, provision, unlock, journal, respond |
//! | `dataset.delete`   | lock, delete storage, delete row, unlock, journal, respond |
//! | `dataset.ingest`   | shared lock, write rows, unlock, journal, respond |
//! | `snapshot.create`  | shared dataset lock, assign id, create row + lock, provision, unlock both, journal, respond |
//! | `snapshot.delete`  | lock, delete storage, delete row, unlock, journal, respond |
//! | `resource.unlock`  | check lock name, check holder inactive, unlock, journal, respond |

pub mod dataset;
mod registry;
mod resource_steps;
pub mod snapshot;
pub mod unlock;

pub use registry::{FlightFactory, FlightRegistry};
pub use resource_steps::{
    AssignResourceIdStep, CreateResourceRowStep, DeleteResourceRowStep, DeleteStorageStep,
    JournalStep, ProvisionStorageStep, ResponseFn, SetResponseStep, WriteRowsStep, DELETED,
    NOT_FOUND,
};

use crate::config::FlightdeckConfig;
use crate::locks::{FlightStatusLookup, LockStore};
use crate::retry::RetryPolicy;
use crate::store::{InMemoryResourceStore, InMemoryStorageDriver, Journal, ResourceRepository, StorageDriver};
use std::sync::Arc;
use std::time::Duration;

/// Creates a dataset.
pub const DATASET_CREATE: &str = "dataset.create";
/// Deletes a dataset.
pub const DATASET_DELETE: &str = "dataset.delete";
/// Ingests rows into a dataset.
pub const DATASET_INGEST: &str = "dataset.ingest";
/// Creates a snapshot of a dataset.
pub const SNAPSHOT_CREATE: &str = "snapshot.create";
/// Deletes a snapshot.
pub const SNAPSHOT_DELETE: &str = "snapshot.delete";
/// Releases a lock on behalf of another flight.
pub const RESOURCE_UNLOCK: &str = "resource.unlock";

/// The backends and retry policies flows are built with.
#[derive(Clone)]
pub struct FlowServices {
    /// Lock state of resource rows.
    pub locks: Arc<dyn LockStore>,
    /// Resource rows.
    pub repository: Arc<dyn ResourceRepository>,
    /// Resource data.
    pub storage: Arc<dyn StorageDriver>,
    /// Mutation journal.
    pub journal: Arc<Journal>,
    /// Status of lock-holding flights.
    pub status_lookup: Arc<dyn FlightStatusLookup>,
    /// Policy for lock and unlock steps.
    pub lock_retry: RetryPolicy,
    /// Policy for every other step.
    pub step_retry: RetryPolicy,
}

impl std::fmt::Debug for FlowServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowServices")
            .field("locks", &self.locks)
            .field("repository", &self.repository)
            .field("storage", &self.storage)
            .field("lock_retry", &self.lock_retry)
            .field("step_retry", &self.step_retry)
            .finish_non_exhaustive()
    }
}

impl FlowServices {
    /// Creates services with an empty journal and default retry policies.
    ///
    /// Lock backoff starts with a pool factor of one; a runner rescales it to
    /// its own worker-pool size.
    #[must_use]
    pub fn new(
        locks: Arc<dyn LockStore>,
        repository: Arc<dyn ResourceRepository>,
        storage: Arc<dyn StorageDriver>,
        status_lookup: Arc<dyn FlightStatusLookup>,
    ) -> Self {
        Self {
            locks,
            repository,
            storage,
            journal: Arc::new(Journal::new()),
            status_lookup,
            lock_retry: RetryPolicy::random_backoff(Duration::from_millis(500), 1, 5),
            step_retry: RetryPolicy::exponential(
                Duration::from_millis(100),
                Duration::from_secs(10),
                Duration::from_secs(60),
            ),
        }
    }

    /// Creates services backed by one in-memory store for both rows and locks.
    #[must_use]
    pub fn in_memory(
        store: Arc<InMemoryResourceStore>,
        storage: Arc<InMemoryStorageDriver>,
        status_lookup: Arc<dyn FlightStatusLookup>,
    ) -> Self {
        Self::new(store.clone(), store, storage, status_lookup)
    }

    /// Uses the given journal.
    #[must_use]
    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = journal;
        self
    }

    /// Sets the lock step policy.
    #[must_use]
    pub fn with_lock_retry(mut self, policy: RetryPolicy) -> Self {
        self.lock_retry = policy;
        self
    }

    /// Sets the policy for non-lock steps.
    #[must_use]
    pub fn with_step_retry(mut self, policy: RetryPolicy) -> Self {
        self.step_retry = policy;
        self
    }

    /// Takes both retry policies from configuration, scaling lock backoff by
    /// the worker-pool size.
    #[must_use]
    pub fn with_config(self, config: &FlightdeckConfig) -> Self {
        let pool_size = config.runner.max_concurrent_flights;
        self.with_lock_retry(config.lock_retry.to_policy(pool_size))
            .with_step_retry(config.step_retry.to_policy(pool_size))
    }
}
