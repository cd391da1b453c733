//! Error types for the storage tiers.

use pkgsync_types::{ArtifactKey, KeyError};
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors a storage tier can report.
///
/// Only [`StorageError::Transient`] is worth retrying. Local-tier failures
/// (`PermissionDenied`, `DiskFull`, `Io`) are fatal for the request.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key is absent where presence was required.
    #[error("artifact not found: {0}")]
    NotFound(ArtifactKey),

    /// Network or remote-service failure.
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("disk full: {0}")]
    DiskFull(String),

    /// The remote service rejected the request in a way retrying will not fix.
    #[error("remote store returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// A name listed by a tier could not be turned into a key.
    #[error("invalid artifact key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Any other local I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid storage configuration: {0}")]
    Config(String),
}

impl StorageError {
    /// Returns true if the operation may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Maps a filesystem error for `key` onto the taxonomy.
    pub fn from_io(err: io::Error, key: &ArtifactKey, context: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(key.clone()),
            io::ErrorKind::PermissionDenied => {
                StorageError::PermissionDenied(format!("{context} {key}: {err}"))
            }
            io::ErrorKind::StorageFull => StorageError::DiskFull(format!("{context} {key}: {err}")),
            _ => StorageError::Io(format!("{context} {key}: {err}")),
        }
    }

    /// Maps a filesystem error that is not tied to a single key, such as a
    /// directory walk.
    pub fn from_io_unkeyed(err: io::Error, context: &str) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => {
                StorageError::PermissionDenied(format!("{context}: {err}"))
            }
            io::ErrorKind::StorageFull => StorageError::DiskFull(format!("{context}: {err}")),
            _ => StorageError::Io(format!("{context}: {err}")),
        }
    }
}
