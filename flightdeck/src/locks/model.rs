//! Resource identity and lock state.

use crate::context::{FlightContext, FlightId};
use crate::errors::FlightError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// The kinds of lockable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A dataset.
    Dataset,
    /// A snapshot of a dataset.
    Snapshot,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dataset => write!(f, "dataset"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Identity of one lockable resource row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// What kind of resource this is.
    pub kind: ResourceKind,
    /// The resource's id.
    pub id: Uuid,
}

impl ResourceId {
    /// Creates a resource id.
    #[must_use]
    pub fn new(kind: ResourceKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Creates a dataset id.
    #[must_use]
    pub fn dataset(id: Uuid) -> Self {
        Self::new(ResourceKind::Dataset, id)
    }

    /// Creates a snapshot id.
    #[must_use]
    pub fn snapshot(id: Uuid) -> Self {
        Self::new(ResourceKind::Snapshot, id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Where a step finds the resource it acts on.
///
/// Flows that create a resource only learn its id after an earlier step ran,
/// so the id can be read from the flight context at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    /// An id known when the flight is built.
    Fixed(ResourceId),
    /// An id read from the working map, falling back to the input parameters.
    FromContext {
        /// Kind of the resource.
        kind: ResourceKind,
        /// Key holding the id.
        key: &'static str,
    },
}

impl ResourceRef {
    /// Refers to an id stored under `key` in the flight context.
    #[must_use]
    pub fn from_context(kind: ResourceKind, key: &'static str) -> Self {
        Self::FromContext { kind, key }
    }

    /// Returns the kind of the referenced resource.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Fixed(id) => id.kind,
            Self::FromContext { kind, .. } => *kind,
        }
    }

    /// Resolves the id against a flight context.
    ///
    /// # Errors
    ///
    /// Returns [`FlightError::MissingValue`] if the key is absent; callers
    /// treat that as an invariant violation.
    pub fn resolve(&self, ctx: &FlightContext) -> Result<ResourceId, FlightError> {
        match self {
            Self::Fixed(id) => Ok(*id),
            Self::FromContext { kind, key } => Ok(ResourceId::new(*kind, ctx.resolve(key)?)),
        }
    }
}

impl From<ResourceId> for ResourceRef {
    fn from(id: ResourceId) -> Self {
        Self::Fixed(id)
    }
}

/// The name a lock is held under.
///
/// An exclusive lock is always named after its holder flight; a shared lock
/// defaults to the holder's flight id but may be given any name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockName(String);

impl LockName {
    /// Creates a lock name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&FlightId> for LockName {
    fn from(id: &FlightId) -> Self {
        Self(id.as_str().to_string())
    }
}

impl From<&str> for LockName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Exclusive or shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// One holder; no shared holders may coexist.
    Exclusive,
    /// Any number of named holders; no exclusive holder may coexist.
    Shared,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclusive => write!(f, "exclusive"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// A request to take or release one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    /// Exclusive or shared.
    pub mode: LockMode,
    /// The lock's name.
    pub name: LockName,
    /// The flight taking or holding the lock.
    pub flight_id: FlightId,
}

impl LockRequest {
    /// Requests the exclusive lock for a flight.
    #[must_use]
    pub fn exclusive(flight_id: &FlightId) -> Self {
        Self {
            mode: LockMode::Exclusive,
            name: LockName::from(flight_id),
            flight_id: flight_id.clone(),
        }
    }

    /// Requests a named shared lock for a flight.
    #[must_use]
    pub fn shared(name: LockName, flight_id: &FlightId) -> Self {
        Self {
            mode: LockMode::Shared,
            name,
            flight_id: flight_id.clone(),
        }
    }
}

/// Result of a conditional lock update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    /// The lock was taken.
    Acquired,
    /// This flight already held the lock; nothing changed.
    AlreadyHeld,
    /// Other flights hold conflicting locks; nothing changed.
    Conflict {
        /// The conflicting holders' flight ids.
        holders: Vec<FlightId>,
    },
}

/// Lock state of one resource row.
///
/// Invariants: at most one exclusive holder; exclusive and shared holders never
/// coexist; each lock name maps to exactly one flight. Every mutation is a
/// single check-and-set on this value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    exclusive: Option<FlightId>,
    shared: BTreeMap<LockName, FlightId>,
}

impl ResourceLock {
    /// Creates an unlocked state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state exclusively held by a flight.
    #[must_use]
    pub fn held_by(flight_id: &FlightId) -> Self {
        Self {
            exclusive: Some(flight_id.clone()),
            shared: BTreeMap::new(),
        }
    }

    /// Returns the exclusive holder.
    #[must_use]
    pub fn exclusive_holder(&self) -> Option<&FlightId> {
        self.exclusive.as_ref()
    }

    /// Returns the shared holders by lock name.
    #[must_use]
    pub fn shared_holders(&self) -> &BTreeMap<LockName, FlightId> {
        &self.shared
    }

    /// Returns true if no lock of any kind is held.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }

    /// Returns every current holder: the exclusive one, then shared ones by name.
    #[must_use]
    pub fn holders(&self) -> Vec<FlightId> {
        self.exclusive
            .iter()
            .chain(self.shared.values())
            .cloned()
            .collect()
    }

    /// Returns every lock name: the exclusive one, then shared ones sorted.
    #[must_use]
    pub fn lock_names(&self) -> Vec<LockName> {
        self.exclusive
            .iter()
            .map(LockName::from)
            .chain(self.shared.keys().cloned())
            .collect()
    }

    /// Finds the holder and mode of a lock by exact name.
    #[must_use]
    pub fn holder_of(&self, name: &LockName) -> Option<(FlightId, LockMode)> {
        if let Some(holder) = &self.exclusive {
            if holder.as_str() == name.as_str() {
                return Some((holder.clone(), LockMode::Exclusive));
            }
        }
        self.shared
            .get(name)
            .map(|holder| (holder.clone(), LockMode::Shared))
    }

    /// Applies a lock request if it does not conflict.
    pub fn try_lock(&mut self, request: &LockRequest) -> LockAttempt {
        match request.mode {
            LockMode::Exclusive => self.try_lock_exclusive(&request.flight_id),
            LockMode::Shared => self.try_lock_shared(&request.name, &request.flight_id),
        }
    }

    /// Releases a lock if it is held under the request's name by the request's flight.
    ///
    /// Returns true if anything changed.
    pub fn release(&mut self, request: &LockRequest) -> bool {
        match request.mode {
            LockMode::Exclusive => {
                if self.exclusive.as_ref() == Some(&request.flight_id) {
                    self.exclusive = None;
                    true
                } else {
                    false
                }
            }
            LockMode::Shared => {
                if self.shared.get(&request.name) == Some(&request.flight_id) {
                    self.shared.remove(&request.name);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn try_lock_exclusive(&mut self, flight_id: &FlightId) -> LockAttempt {
        if self.exclusive.as_ref() == Some(flight_id) {
            return LockAttempt::AlreadyHeld;
        }
        if !self.is_unlocked() {
            return LockAttempt::Conflict {
                holders: self.holders(),
            };
        }
        self.exclusive = Some(flight_id.clone());
        LockAttempt::Acquired
    }

    fn try_lock_shared(&mut self, name: &LockName, flight_id: &FlightId) -> LockAttempt {
        if let Some(holder) = &self.exclusive {
            return LockAttempt::Conflict {
                holders: vec![holder.clone()],
            };
        }
        match self.shared.get(name) {
            Some(holder) if holder == flight_id => LockAttempt::AlreadyHeld,
            Some(holder) => LockAttempt::Conflict {
                holders: vec![holder.clone()],
            },
            None => {
                self.shared.insert(name.clone(), flight_id.clone());
                LockAttempt::Acquired
            }
        }
    }
}
