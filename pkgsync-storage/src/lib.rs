//! Storage tiers for pkgsync.
//!
//! Two implementations share the [`StorageClient`] capability:
//! - [`LocalStorage`], a directory tree (the local package cache, and the
//!   remote stand-in for the dev tier)
//! - [`GcsStorage`], a Google Cloud Storage bucket (the authoritative remote
//!   tier in production)
//!
//! The remote client owns its own timeout and retry behaviour
//! ([`RetryPolicy`]); callers above this crate never retry.

mod client;
mod error;
pub mod gcs;
pub mod local;
pub mod retry;

pub use client::StorageClient;
pub use error::{StorageError, StorageResult};
pub use gcs::{GcsConfig, GcsStorage};
pub use local::{LocalStorage, TEMP_FILE_PREFIX};
pub use retry::RetryPolicy;
