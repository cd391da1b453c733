//! Storage tier abstraction.
//!
//! Defines the capability every tier offers, whether it is the local
//! filesystem cache or the remote object store.

use crate::error::StorageResult;
use async_trait::async_trait;
use pkgsync_types::{ArtifactKey, ArtifactRecord};

/// Uniform capability over one storage tier.
///
/// Implementations must honour the same contract:
/// - `list` never fails because the root or prefix is missing; it returns
///   an empty listing instead.
/// - `stat` returns `None` for an absent key.
/// - `read` fails with `StorageError::NotFound` for an absent key.
/// - `write` replaces existing content, so repeating it is harmless.
/// - `delete` of an absent key succeeds.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Short name of the tier for logs ("local", "gcs", ...).
    fn tier_name(&self) -> &'static str;

    /// Human-readable location of the tier root.
    fn location(&self) -> String;

    /// Lists every artifact whose key starts with `prefix` (everything when
    /// `None`). All returned records have `exists == true`.
    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<ArtifactRecord>>;

    /// Size and modification time of `key`, or `None` when absent.
    async fn stat(&self, key: &ArtifactKey) -> StorageResult<Option<ArtifactRecord>>;

    /// Full content of `key`.
    async fn read(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>>;

    /// Stores `content` at `key`, replacing anything already there.
    async fn write(&self, key: &ArtifactKey, content: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Absent keys are not an error.
    async fn delete(&self, key: &ArtifactKey) -> StorageResult<()>;

    /// Observed record for `key`, absent records included.
    async fn observe(&self, key: &ArtifactKey) -> StorageResult<ArtifactRecord> {
        Ok(self
            .stat(key)
            .await?
            .unwrap_or_else(|| ArtifactRecord::absent(key.clone())))
    }
}
