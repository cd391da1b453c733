//! Transfer strategies, one per change kind.
//!
//! `driver_for` is an exhaustive match, so adding a `ChangeKind` variant
//! fails to compile until it is given a driver.

use crate::error::{SyncError, SyncResult};
use crate::event::{ChangeKind, ContentChangeEvent};
use pkgsync_storage::{StorageClient, StorageError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The two storage tiers a driver moves data between.
#[derive(Clone)]
pub struct Tiers {
    pub local: Arc<dyn StorageClient>,
    pub remote: Arc<dyn StorageClient>,
}

impl Tiers {
    pub fn new(local: Arc<dyn StorageClient>, remote: Arc<dyn StorageClient>) -> Self {
        Self { local, remote }
    }
}

impl fmt::Debug for Tiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tiers")
            .field("local", &self.local.location())
            .field("remote", &self.remote.location())
            .finish()
    }
}

/// A strategy that brings one key back into agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// Leaves both tiers untouched.
    Noop,
    /// Copies the remote artifact over the local tier.
    Download,
    /// Copies the local artifact to the remote tier.
    Upload,
    /// Removes the local copy.
    DeleteLocal,
    /// Removes the remote copy.
    DeleteRemote,
}

/// Maps each change kind to exactly one driver.
///
/// Conflicts resolve with the remote copy winning.
pub fn driver_for(kind: ChangeKind) -> Driver {
    match kind {
        ChangeKind::CreatedLocal => Driver::Upload,
        ChangeKind::CreatedRemote => Driver::Download,
        ChangeKind::DeletedLocal => Driver::DeleteRemote,
        ChangeKind::DeletedRemote => Driver::DeleteLocal,
        ChangeKind::Conflict => Driver::Download,
        ChangeKind::InSync => Driver::Noop,
    }
}

/// Result of running a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverOutcome {
    pub driver: Driver,
    /// Bytes copied between tiers; zero for deletions and no-ops.
    pub bytes: u64,
}

impl Driver {
    pub fn as_str(self) -> &'static str {
        match self {
            Driver::Noop => "noop",
            Driver::Download => "download",
            Driver::Upload => "upload",
            Driver::DeleteLocal => "delete_local",
            Driver::DeleteRemote => "delete_remote",
        }
    }

    /// Executes this driver for `event`.
    ///
    /// Fails with `ConflictResolution` when the driver is not the one
    /// `driver_for` assigns to the event's kind. Storage failures are passed
    /// through untouched, and no driver retries on its own.
    pub async fn run(self, event: &ContentChangeEvent, tiers: &Tiers) -> SyncResult<DriverOutcome> {
        let expected = driver_for(event.kind());
        if expected != self {
            return Err(SyncError::ConflictResolution(format!(
                "{} driver cannot handle {} event for {} (expected {})",
                self,
                event.kind(),
                event.key(),
                expected
            )));
        }

        let key = event.key();
        let bytes = match self {
            Driver::Noop => {
                debug!(key = %key, "in sync");
                0
            }
            Driver::Download => {
                if event.kind() == ChangeKind::Conflict {
                    warn!(
                        key = %key,
                        local_size = ?event.local().size,
                        remote_size = ?event.remote().size,
                        "size conflict, remote copy wins"
                    );
                }
                let content = tiers.remote.read(key).await?;
                tiers.local.write(key, &content).await?;
                info!(
                    key = %key,
                    bytes = content.len(),
                    from = tiers.remote.tier_name(),
                    "downloaded artifact"
                );
                content.len() as u64
            }
            Driver::Upload => {
                // The local copy may have vanished since it was observed.
                if tiers.local.stat(key).await?.is_none() {
                    return Err(StorageError::NotFound(key.clone()).into());
                }
                let content = tiers.local.read(key).await?;
                tiers.remote.write(key, &content).await?;
                info!(
                    key = %key,
                    bytes = content.len(),
                    to = tiers.remote.tier_name(),
                    "uploaded artifact"
                );
                content.len() as u64
            }
            Driver::DeleteLocal => {
                tiers.local.delete(key).await?;
                info!(key = %key, "removed local copy");
                0
            }
            Driver::DeleteRemote => {
                tiers.remote.delete(key).await?;
                info!(key = %key, tier = tiers.remote.tier_name(), "removed remote copy");
                0
            }
        };

        Ok(DriverOutcome {
            driver: self,
            bytes,
        })
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the driver for `event` and runs it.
pub async fn dispatch(event: &ContentChangeEvent, tiers: &Tiers) -> SyncResult<DriverOutcome> {
    driver_for(event.kind()).run(event, tiers).await
}
