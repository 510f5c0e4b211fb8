//! Resource locking, expressed as ordinary flight steps.
//!
//! Concurrent flights on the same dataset or snapshot are serialized through
//! lock state stored on the resource row itself:
//!
//! - one exclusive holder, or any number of named shared holders, never both
//! - every mutation is a single conditional update through [`LockStore`]
//! - locks are taken by [`LockResourceStep`] at the start of a flow and
//!   released by [`UnlockResourceStep`] at its end
//! - an administrative unlock runs [`CheckLockNameStep`] and
//!   [`CheckJobNotActiveStep`] before releasing someone else's lock

mod checks;
mod model;
mod steps;
mod store;

pub use checks::{CheckJobNotActiveStep, CheckLockNameStep};
pub use model::{
    LockAttempt, LockMode, LockName, LockRequest, ResourceId, ResourceKind, ResourceLock,
    ResourceRef,
};
pub use steps::{LockResourceStep, UnlockResourceStep};
pub use store::{FlightStatusLookup, LockStore};
