//! Audit journal of resource mutations.

use crate::context::FlightId;
use crate::locks::ResourceId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The flight that made the change.
    pub flight_id: FlightId,
    /// The resource changed.
    pub resource: ResourceId,
    /// What happened, e.g. "created" or "deleted".
    pub action: String,
    /// Free-form detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the entry was written.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only journal keyed by (flight, resource, action).
///
/// Recording the same key twice keeps the first entry, so a re-run journal
/// step is harmless.
#[derive(Debug, Default)]
pub struct Journal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry. Returns false if the same entry already exists.
    pub fn record(
        &self,
        flight_id: &FlightId,
        resource: &ResourceId,
        action: &str,
        note: Option<String>,
    ) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| Self::matches(e, flight_id, resource, action)) {
            return false;
        }
        entries.push(JournalEntry {
            flight_id: flight_id.clone(),
            resource: *resource,
            action: action.to_string(),
            note,
            recorded_at: Utc::now(),
        });
        true
    }

    /// Removes an entry. Returns false if it was not recorded.
    pub fn remove(&self, flight_id: &FlightId, resource: &ResourceId, action: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !Self::matches(e, flight_id, resource, action));
        entries.len() != before
    }

    /// Returns the entries for one resource in recording order.
    #[must_use]
    pub fn entries_for(&self, resource: &ResourceId) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| &e.resource == resource)
            .cloned()
            .collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the journal is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn matches(entry: &JournalEntry, flight_id: &FlightId, resource: &ResourceId, action: &str) -> bool {
        &entry.flight_id == flight_id && &entry.resource == resource && entry.action == action
    }
}
