//! Hook points offered to the serving layer.

use crate::coordinator::{RequestScope, SyncCoordinator};
use crate::error::SyncResult;
use async_trait::async_trait;
use pkgsync_types::{ArtifactKey, WriteKind};

/// Callbacks a package-serving layer invokes around each request.
///
/// Any error returned must fail the request.
#[async_trait]
pub trait SyncHooks: Send + Sync {
    /// Runs before the request touches the local tier.
    async fn before_request(&self, scope: &RequestScope) -> SyncResult<()>;

    /// Runs after a mutation of the local tier has completed.
    async fn after_write(&self, key: &ArtifactKey, kind: WriteKind) -> SyncResult<()>;
}

#[async_trait]
impl SyncHooks for SyncCoordinator {
    async fn before_request(&self, scope: &RequestScope) -> SyncResult<()> {
        self.reconcile_before_read(scope).await.map(|_| ())
    }

    async fn after_write(&self, key: &ArtifactKey, kind: WriteKind) -> SyncResult<()> {
        self.reconcile_after_write(key, kind).await.map(|_| ())
    }
}
