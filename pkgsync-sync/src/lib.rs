//! # pkgsync-sync
//!
//! Keeps a local package cache and a remote object store in agreement.
//!
//! Every reconciliation pass observes both tiers for the keys in scope,
//! classifies each pair into a [`ChangeKind`], and runs the one [`Driver`]
//! assigned to that kind. No index is kept between passes.

mod coordinator;
mod driver;
mod error;
mod event;
mod hooks;
pub mod settings;

pub use coordinator::{KeyOutcome, ReconcileReport, RequestScope, SyncCoordinator};
pub use driver::{Driver, DriverOutcome, Tiers, dispatch, driver_for};
pub use error::{SyncError, SyncResult};
pub use event::{ChangeKind, ContentChangeEvent, classify, classify_kind};
pub use hooks::SyncHooks;
pub use settings::{GlobalSettings, PropagationMode, RemoteBackend, Tier, TierPreset};
