//! Error types for the sync layer.

use pkgsync_storage::StorageError;
use pkgsync_types::KeyError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Storage failures pass through unchanged in kind so the serving layer can
/// tell a transient remote outage from a fatal local one.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A storage tier failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A driver was dispatched for an event it cannot handle, or an event
    /// was built from mismatched records. Indicates a classification bug.
    #[error("conflict resolution failed: {0}")]
    ConflictResolution(String),

    /// Invalid settings.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid artifact key.
    #[error("invalid artifact key: {0}")]
    Key(#[from] KeyError),
}

impl SyncError {
    /// Returns true if repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Storage(e) if e.is_retryable())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Storage(e) if e.is_not_found())
    }

    /// The underlying storage error, if any.
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            SyncError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
