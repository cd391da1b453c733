//! Core type definitions for pkgsync.
//!
//! This crate defines the plugin-free vocabulary shared by the storage tiers
//! and the sync engine:
//! - Artifact keys (validated relative paths of package files)
//! - Per-tier observations of an artifact (`ArtifactRecord`)
//! - Write kinds reported by the serving layer
//!
//! Nothing here performs I/O. Records are produced fresh on every
//! reconciliation pass and are never persisted.

mod key;
mod record;

pub use key::{ArtifactKey, KeyError};
pub use record::{ArtifactRecord, WriteKind};
