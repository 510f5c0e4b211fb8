//! Storage driver boundary.
//!
//! Stands in for the cloud services that hold a resource's data (tables,
//! buckets). Each flow step calls exactly one driver operation.

use crate::errors::StoreError;
use crate::locks::ResourceId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};

/// Cloud storage operations used by the business flows.
///
/// Every operation is idempotent: creating an existing container or deleting
/// a missing one is not an error.
#[async_trait]
pub trait StorageDriver: Send + Sync + Debug {
    /// Creates the container backing a resource; returns its name.
    async fn create_container(&self, resource: &ResourceId) -> Result<String, StoreError>;

    /// Deletes a resource's container. Returns false if it did not exist.
    async fn delete_container(&self, resource: &ResourceId) -> Result<bool, StoreError>;

    /// Returns true if the container exists.
    async fn container_exists(&self, resource: &ResourceId) -> Result<bool, StoreError>;

    /// Writes one batch of rows, replacing any earlier write of the same batch.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the container does not exist.
    async fn write_rows(
        &self,
        resource: &ResourceId,
        batch: &str,
        rows: &[serde_json::Value],
    ) -> Result<u64, StoreError>;

    /// Deletes one batch of rows. Returns false if it was not written.
    async fn delete_rows(&self, resource: &ResourceId, batch: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
struct Container {
    name: String,
    batches: BTreeMap<String, Vec<serde_json::Value>>,
}

/// Storage driver that keeps containers in memory.
#[derive(Debug, Default)]
pub struct InMemoryStorageDriver {
    containers: Mutex<HashMap<ResourceId, Container>>,
    failures: AtomicU32,
    unavailable: AtomicU32,
}

impl InMemoryStorageDriver {
    /// Creates an empty driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls fail with a retryable error.
    pub fn inject_failures(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail with a non-retryable backend error.
    pub fn inject_outage(&self, count: u32) {
        self.unavailable.store(count, Ordering::SeqCst);
    }

    /// Returns the number of rows stored for a resource.
    #[must_use]
    pub fn row_count(&self, resource: &ResourceId) -> usize {
        self.containers
            .lock()
            .get(resource)
            .map_or(0, |c| c.batches.values().map(Vec::len).sum())
    }

    /// Returns the number of containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.lock().len()
    }

    fn check_faults(&self, operation: &str) -> Result<(), StoreError> {
        let take = |counter: &AtomicU32| {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        };
        if take(&self.unavailable) {
            return Err(StoreError::Backend(format!("{operation}: storage unavailable")));
        }
        if take(&self.failures) {
            return Err(StoreError::Contention(format!("{operation}: rate limited")));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageDriver for InMemoryStorageDriver {
    async fn create_container(&self, resource: &ResourceId) -> Result<String, StoreError> {
        self.check_faults("create_container")?;
        let mut containers = self.containers.lock();
        let container = containers.entry(*resource).or_insert_with(|| Container {
            name: format!("{}_{}", resource.kind, resource.id.simple()),
            batches: BTreeMap::new(),
        });
        Ok(container.name.clone())
    }

    async fn delete_container(&self, resource: &ResourceId) -> Result<bool, StoreError> {
        self.check_faults("delete_container")?;
        Ok(self.containers.lock().remove(resource).is_some())
    }

    async fn container_exists(&self, resource: &ResourceId) -> Result<bool, StoreError> {
        Ok(self.containers.lock().contains_key(resource))
    }

    async fn write_rows(
        &self,
        resource: &ResourceId,
        batch: &str,
        rows: &[serde_json::Value],
    ) -> Result<u64, StoreError> {
        self.check_faults("write_rows")?;
        let mut containers = self.containers.lock();
        let container = containers
            .get_mut(resource)
            .ok_or_else(|| StoreError::NotFound(format!("container for {resource}")))?;
        container.batches.insert(batch.to_string(), rows.to_vec());
        Ok(rows.len() as u64)
    }

    async fn delete_rows(&self, resource: &ResourceId, batch: &str) -> Result<bool, StoreError> {
        self.check_faults("delete_rows")?;
        Ok(self
            .containers
            .lock()
            .get_mut(resource)
            .is_some_and(|c| c.batches.remove(batch).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_container_lifecycle_is_idempotent() {
        let driver = InMemoryStorageDriver::new();
        let resource = ResourceId::dataset(Uuid::new_v4());

        let first = driver.create_container(&resource).await.unwrap();
        let second = driver.create_container(&resource).await.unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("dataset_"));

        assert!(driver.delete_container(&resource).await.unwrap());
        assert!(!driver.delete_container(&resource).await.unwrap());
        assert!(!driver.container_exists(&resource).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_rows_replaces_batch() {
        let driver = InMemoryStorageDriver::new();
        let resource = ResourceId::dataset(Uuid::new_v4());
        driver.create_container(&resource).await.unwrap();

        let rows = vec![json!({"a": 1}), json!({"a": 2})];
        assert_eq!(driver.write_rows(&resource, "b1", &rows).await.unwrap(), 2);
        assert_eq!(driver.write_rows(&resource, "b1", &rows).await.unwrap(), 2);
        assert_eq!(driver.row_count(&resource), 2);

        assert!(driver.delete_rows(&resource, "b1").await.unwrap());
        assert_eq!(driver.row_count(&resource), 0);
    }

    #[tokio::test]
    async fn test_write_rows_without_container() {
        let driver = InMemoryStorageDriver::new();
        let resource = ResourceId::dataset(Uuid::new_v4());
        let err = driver.write_rows(&resource, "b1", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let driver = InMemoryStorageDriver::new();
        let resource = ResourceId::dataset(Uuid::new_v4());
        driver.inject_failures(1);
        driver.inject_outage(1);

        assert!(matches!(
            driver.create_container(&resource).await,
            Err(StoreError::Backend(_))
        ));
        assert!(matches!(
            driver.create_container(&resource).await,
            Err(StoreError::Contention(_))
        ));
        assert!(driver.create_container(&resource).await.is_ok());
    }
}
