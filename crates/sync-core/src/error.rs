//! Fatal reconciliation errors.

use thiserror::Error;

/// Errors that abort an entire reconcile batch.
///
/// Per-item problems (validation failures, rejected writes) never surface
/// here; they are captured inside the [`BatchReport`](crate::BatchReport)
/// and processing continues with the next item.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backing store could not be reached or failed outside a single
    /// row operation. Unresolved items are never silently treated as
    /// non-existing; the whole batch fails instead.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}
