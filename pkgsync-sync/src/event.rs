//! Classification of a per-key observation pair.
//!
//! The decision table is evaluated top to bottom, first match wins:
//!
//! | local              | remote             | kind            |
//! |--------------------|--------------------|-----------------|
//! | tombstone          | exists             | `DeletedLocal`  |
//! | tombstone          | absent             | `InSync`        |
//! | exists             | tombstone          | `DeletedRemote` |
//! | absent             | tombstone          | `InSync`        |
//! | absent             | absent             | `InSync`        |
//! | exists             | absent             | `CreatedLocal`  |
//! | absent             | exists             | `CreatedRemote` |
//! | exists, size a     | exists, size b≠a   | `Conflict`      |
//! | exists             | exists             | `InSync`        |
//!
//! Modification times are carried in the records but never consulted: clock
//! skew between the tiers makes them unreliable.

use crate::error::{SyncError, SyncResult};
use pkgsync_types::{ArtifactKey, ArtifactRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The difference between the two tiers for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Only the local tier has the artifact.
    CreatedLocal,
    /// Only the remote tier has the artifact.
    CreatedRemote,
    /// The artifact was deleted locally and still exists remotely.
    DeletedLocal,
    /// The artifact was deleted remotely and still exists locally.
    DeletedRemote,
    /// Both tiers have the artifact with different sizes.
    Conflict,
    /// Nothing to do.
    InSync,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 6] = [
        ChangeKind::CreatedLocal,
        ChangeKind::CreatedRemote,
        ChangeKind::DeletedLocal,
        ChangeKind::DeletedRemote,
        ChangeKind::Conflict,
        ChangeKind::InSync,
    ];

    /// Whether a driver has to move or remove data for this kind.
    pub fn needs_action(self) -> bool {
        self != ChangeKind::InSync
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::CreatedLocal => "created_local",
            ChangeKind::CreatedRemote => "created_remote",
            ChangeKind::DeletedLocal => "deleted_local",
            ChangeKind::DeletedRemote => "deleted_remote",
            ChangeKind::Conflict => "conflict",
            ChangeKind::InSync => "in_sync",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified observation pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentChangeEvent {
    kind: ChangeKind,
    local: ArtifactRecord,
    remote: ArtifactRecord,
}

impl ContentChangeEvent {
    /// Builds an event with an explicit kind. Both records must describe the
    /// same key.
    pub fn new(
        kind: ChangeKind,
        local: ArtifactRecord,
        remote: ArtifactRecord,
    ) -> SyncResult<Self> {
        if local.key != remote.key {
            return Err(SyncError::ConflictResolution(format!(
                "records describe different keys: {} vs {}",
                local.key, remote.key
            )));
        }
        Ok(Self {
            kind,
            local,
            remote,
        })
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn key(&self) -> &ArtifactKey {
        &self.local.key
    }

    pub fn local(&self) -> &ArtifactRecord {
        &self.local
    }

    pub fn remote(&self) -> &ArtifactRecord {
        &self.remote
    }
}

/// Pure decision table over two records. Total: every pair maps to exactly
/// one kind.
pub fn classify_kind(local: &ArtifactRecord, remote: &ArtifactRecord) -> ChangeKind {
    if local.tombstone {
        return if remote.exists {
            ChangeKind::DeletedLocal
        } else {
            ChangeKind::InSync
        };
    }
    if remote.tombstone {
        return if local.exists {
            ChangeKind::DeletedRemote
        } else {
            ChangeKind::InSync
        };
    }
    match (local.exists, remote.exists) {
        (false, false) => ChangeKind::InSync,
        (true, false) => ChangeKind::CreatedLocal,
        (false, true) => ChangeKind::CreatedRemote,
        (true, true) => match local.same_size(remote) {
            Some(false) => ChangeKind::Conflict,
            // Equal sizes, or a size one side could not report.
            Some(true) | None => ChangeKind::InSync,
        },
    }
}

/// Classifies a pair of records for the same key.
pub fn classify(local: ArtifactRecord, remote: ArtifactRecord) -> SyncResult<ContentChangeEvent> {
    let kind = classify_kind(&local, &remote);
    ContentChangeEvent::new(kind, local, remote)
}
