//! Resource rows, storage and journal backends.
//!
//! The traits here are the seams between flows and the outside world; the
//! in-memory implementations back tests and local runs.

mod journal;
mod memory;
mod repository;
mod storage;

pub use journal::{Journal, JournalEntry};
pub use memory::InMemoryResourceStore;
pub use repository::{NewResource, ResourceRecord, ResourceRepository};
pub use storage::{InMemoryStorageDriver, StorageDriver};
