//! Well-known keys in flight input parameters and working maps.

/// Id of the resource a flight creates or acts on.
pub const RESOURCE_ID: &str = "resource_id";
/// Id of the dataset a flight acts on.
pub const DATASET_ID: &str = "dataset_id";
/// Id of the snapshot a flight acts on.
pub const SNAPSHOT_ID: &str = "snapshot_id";
/// Name of a resource being created.
pub const NAME: &str = "name";
/// Free-form description of a resource being created.
pub const DESCRIPTION: &str = "description";
/// Rows to ingest.
pub const ROWS: &str = "rows";
/// Number of rows written by an ingest.
pub const ROW_COUNT: &str = "row_count";
/// The flight's response payload.
pub const RESPONSE: &str = "response";
/// The flight's response status code.
pub const STATUS_CODE: &str = "status_code";
/// `"deleted"` or `"not_found"` after a delete flight.
pub const DELETE_OUTCOME: &str = "delete_outcome";
/// Lock name requested by a manual unlock.
pub const LOCK_NAME: &str = "lock_name";
/// Skip the holder-activity check during a manual unlock.
pub const FORCE: &str = "force";
/// Flight id holding the lock found by a lock-name check.
pub const LOCK_HOLDER: &str = "lock_holder";
/// Whether the lock found by a lock-name check is shared.
pub const IS_SHARED_LOCK: &str = "is_shared_lock";
/// Whether a manual unlock actually removed a lock.
pub const UNLOCKED: &str = "unlocked";
/// Kind of the resource a manual unlock acts on: `"dataset"` or `"snapshot"`.
pub const RESOURCE_KIND: &str = "resource_kind";
