//! Per-tier observations of an artifact.

use crate::ArtifactKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What one tier reported about one key during a reconciliation pass.
///
/// `tombstone` is never observed on storage; it is a signal injected by the
/// write path (or an operator) saying the artifact was just deleted on that
/// side and the deletion must win over the other tier's copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub key: ArtifactKey,
    pub exists: bool,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tombstone: bool,
}

impl ArtifactRecord {
    /// A record for an artifact that exists on the tier.
    #[must_use]
    pub fn present(key: ArtifactKey, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            key,
            exists: true,
            size: Some(size),
            modified,
            tombstone: false,
        }
    }

    /// A record for an artifact the tier does not have.
    #[must_use]
    pub fn absent(key: ArtifactKey) -> Self {
        Self {
            key,
            exists: false,
            size: None,
            modified: None,
            tombstone: false,
        }
    }

    /// An absent record carrying the deletion signal.
    #[must_use]
    pub fn tombstone(key: ArtifactKey) -> Self {
        Self {
            tombstone: true,
            ..Self::absent(key)
        }
    }

    /// Marks an existing observation as deleted. Used when the write path
    /// reports a deletion but the tier still lists the file.
    #[must_use]
    pub fn into_tombstone(mut self) -> Self {
        self.tombstone = true;
        self
    }

    /// Compares sizes; `None` when either side's size is unknown.
    #[must_use]
    pub fn same_size(&self, other: &ArtifactRecord) -> Option<bool> {
        match (self.size, other.size) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        }
    }
}

/// The mutation a write request performed on the local tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    Create,
    Delete,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::Create => f.write_str("create"),
            WriteKind::Delete => f.write_str("delete"),
        }
    }
}
