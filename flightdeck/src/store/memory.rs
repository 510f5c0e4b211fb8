//! In-memory resource store.

use super::{NewResource, ResourceRecord, ResourceRepository};
use crate::context::FlightId;
use crate::errors::StoreError;
use crate::locks::{LockAttempt, LockRequest, LockStore, ResourceId, ResourceKind, ResourceLock};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Resource rows and their lock state, held in memory.
///
/// Each row's lock is updated under its map shard lock, which gives the
/// single atomic conditional update the lock protocol relies on.
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    rows: DashMap<ResourceId, ResourceRecord>,
    names: DashMap<(ResourceKind, String), ResourceId>,
    contention: AtomicU32,
}

impl InMemoryResourceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` mutating calls fail with [`StoreError::Contention`].
    pub fn inject_contention(&self, count: u32) {
        self.contention.store(count, Ordering::SeqCst);
    }

    /// Inserts an unlocked row directly.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the name is taken.
    pub fn insert(&self, resource: &NewResource, created_by: &FlightId) -> Result<(), StoreError> {
        match self.names.entry((resource.id.kind, resource.name.clone())) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(resource.name.clone())),
            Entry::Vacant(slot) => {
                slot.insert(resource.id);
                self.rows
                    .insert(resource.id, ResourceRecord::new(resource, created_by));
                Ok(())
            }
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_contention(&self, operation: &str) -> Result<(), StoreError> {
        let injected = self
            .contention
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Contention(format!(
                "could not serialize {operation}"
            )));
        }
        Ok(())
    }

    fn sorted(&self, kind: ResourceKind, include: impl Fn(&ResourceRecord) -> bool) -> Vec<ResourceRecord> {
        let mut records: Vec<ResourceRecord> = self
            .rows
            .iter()
            .filter(|row| row.id.kind == kind && include(row.value()))
            .map(|row| row.value().clone())
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

#[async_trait]
impl LockStore for InMemoryResourceStore {
    async fn lock(
        &self,
        resource: &ResourceId,
        request: &LockRequest,
    ) -> Result<LockAttempt, StoreError> {
        self.check_contention("lock")?;
        let mut row = self
            .rows
            .get_mut(resource)
            .ok_or_else(|| StoreError::NotFound(resource.to_string()))?;
        Ok(row.locks.try_lock(request))
    }

    async fn unlock(
        &self,
        resource: &ResourceId,
        request: &LockRequest,
    ) -> Result<bool, StoreError> {
        self.check_contention("unlock")?;
        Ok(self
            .rows
            .get_mut(resource)
            .is_some_and(|mut row| row.locks.release(request)))
    }

    async fn locks(&self, resource: &ResourceId) -> Result<ResourceLock, StoreError> {
        self.rows
            .get(resource)
            .map(|row| row.locks.clone())
            .ok_or_else(|| StoreError::NotFound(resource.to_string()))
    }
}

#[async_trait]
impl ResourceRepository for InMemoryResourceStore {
    async fn create_and_lock(
        &self,
        resource: &NewResource,
        flight_id: &FlightId,
    ) -> Result<(), StoreError> {
        self.check_contention("create")?;
        match self.names.entry((resource.id.kind, resource.name.clone())) {
            Entry::Occupied(existing) => {
                let ours = *existing.get() == resource.id
                    && self
                        .rows
                        .get(&resource.id)
                        .is_some_and(|row| &row.created_by == flight_id);
                if ours {
                    Ok(())
                } else {
                    Err(StoreError::AlreadyExists(format!(
                        "{} named {}",
                        resource.id.kind, resource.name
                    )))
                }
            }
            Entry::Vacant(slot) => {
                if self.rows.contains_key(&resource.id) {
                    return Err(StoreError::AlreadyExists(resource.id.to_string()));
                }
                slot.insert(resource.id);
                let mut record = ResourceRecord::new(resource, flight_id);
                record.locks = ResourceLock::held_by(flight_id);
                self.rows.insert(resource.id, record);
                Ok(())
            }
        }
    }

    async fn delete(&self, id: &ResourceId) -> Result<bool, StoreError> {
        self.check_contention("delete")?;
        let Some((_, record)) = self.rows.remove(id) else {
            return Ok(false);
        };
        self.names.remove(&(id.kind, record.name));
        Ok(true)
    }

    async fn delete_if_created_by(
        &self,
        id: &ResourceId,
        flight_id: &FlightId,
    ) -> Result<bool, StoreError> {
        let Some((_, record)) = self
            .rows
            .remove_if(id, |_, row| &row.created_by == flight_id)
        else {
            return Ok(false);
        };
        self.names.remove(&(id.kind, record.name));
        Ok(true)
    }

    async fn get(&self, id: &ResourceId) -> Result<Option<ResourceRecord>, StoreError> {
        Ok(self.rows.get(id).map(|row| row.value().clone()))
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>, StoreError> {
        Ok(self.sorted(kind, |_| true))
    }

    async fn list_available(
        &self,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceRecord>, StoreError> {
        Ok(self.sorted(kind, |row| row.locks.exclusive_holder().is_none()))
    }

    async fn record_ingest(
        &self,
        id: &ResourceId,
        batch: &str,
        rows: u64,
    ) -> Result<(), StoreError> {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.ingests.insert(batch.to_string(), rows);
        Ok(())
    }

    async fn remove_ingest(&self, id: &ResourceId, batch: &str) -> Result<bool, StoreError> {
        Ok(self
            .rows
            .get_mut(id)
            .is_some_and(|mut row| row.ingests.remove(batch).is_some()))
    }
}
