//! Bounded worker pool for flight execution.

use crate::errors::FlightError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps how many flights execute at once.
///
/// A flight holds one permit for its whole run. Submissions beyond the pool
/// size wait for a permit instead of failing.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool with `size` permits. A size of zero is raised to one.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        tracing::debug!(size, "Created worker pool");
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Waits for a free worker.
    ///
    /// # Errors
    ///
    /// [`FlightError::Shutdown`] once the pool has been closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, FlightError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| FlightError::Shutdown)
    }

    /// Closes the pool; waiting and future acquisitions fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Number of permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Total number of permits.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_returned_on_drop() {
        let pool = WorkerPool::new(2);
        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(first);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
        pool.close();
        assert_eq!(pool.acquire().await.unwrap_err(), FlightError::Shutdown);
    }
}
