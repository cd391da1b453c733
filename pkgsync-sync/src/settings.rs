//! Process-wide settings.
//!
//! Read once at startup from the environment, then shared read-only behind
//! an `Arc`. Nothing mutates a `GlobalSettings` after construction.

use crate::driver::Tiers;
use crate::error::{SyncError, SyncResult};
use pkgsync_storage::{GcsConfig, GcsStorage, LocalStorage, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
pub const ENV_LOCAL_PACKAGE_DIRECTORY: &str = "LOCAL_PACKAGE_DIRECTORY";
pub const ENV_REMOTE_PACKAGE_DIRECTORY: &str = "REMOTE_PACKAGE_DIRECTORY";
pub const ENV_TIER: &str = "TIER";
pub const ENV_PROPAGATION_MODE: &str = "PROPAGATION_MODE";
pub const ENV_GCS_API_BASE_URL: &str = "GCS_API_BASE_URL";
pub const ENV_GCS_ACCESS_TOKEN: &str = "GCS_ACCESS_TOKEN";

/// Bucket used when `BUCKET_NAME` is unset.
pub const DEFAULT_BUCKET_NAME: &str = "YOUR-DEFAULT-BUCKET-NAME";

/// Named deployment preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Everything on the local machine; the "remote" tier is a directory.
    Dev,
    /// Local cache in front of a Cloud Storage bucket.
    Production,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Dev => "dev",
            Tier::Production => "production",
        }
    }

    /// Defaults bundled with the tier.
    pub fn preset(self) -> TierPreset {
        match self {
            Tier::Dev => TierPreset {
                local_root: "./packages",
                remote_root: "./.remote_packages",
                remote_backend: RemoteBackend::Directory,
                propagation: PropagationMode::Synchronous,
                remote_timeout_secs: 30,
                remote_retries: 0,
                max_concurrent_transfers: 4,
            },
            Tier::Production => TierPreset {
                local_root: "/tmp/packages",
                remote_root: "packages",
                remote_backend: RemoteBackend::Gcs,
                propagation: PropagationMode::Synchronous,
                remote_timeout_secs: 60,
                remote_retries: 3,
                max_concurrent_transfers: 8,
            },
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Tier::Dev),
            "prod" | "production" => Ok(Tier::Production),
            other => Err(SyncError::Config(format!("unknown tier: {other:?}"))),
        }
    }
}

/// Which implementation plays the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// A second directory on the local filesystem.
    Directory,
    /// Google Cloud Storage.
    Gcs,
}

/// When a local write is pushed to the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationMode {
    /// The write response waits for the remote tier.
    Synchronous,
    /// The write response returns immediately; propagation runs in the
    /// background and failures are only logged.
    Deferred,
}

impl FromStr for PropagationMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(PropagationMode::Synchronous),
            "deferred" | "async" | "background" => Ok(PropagationMode::Deferred),
            other => Err(SyncError::Config(format!(
                "unknown propagation mode: {other:?}"
            ))),
        }
    }
}

/// Defaults selected by a [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPreset {
    pub local_root: &'static str,
    pub remote_root: &'static str,
    pub remote_backend: RemoteBackend,
    pub propagation: PropagationMode,
    pub remote_timeout_secs: u64,
    pub remote_retries: u32,
    pub max_concurrent_transfers: usize,
}

/// Immutable process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub tier: Tier,
    pub bucket_name: String,
    pub local_root: PathBuf,
    pub remote_root: String,
    pub remote_backend: RemoteBackend,
    pub propagation: PropagationMode,
    pub remote_timeout_secs: u64,
    pub remote_retry: RetryPolicy,
    /// Upper bound on concurrent driver runs within one listing pass.
    pub max_concurrent_transfers: usize,
    pub gcs_api_base_url: String,
    #[serde(skip)]
    pub gcs_access_token: Option<String>,
}

impl GlobalSettings {
    /// Preset values for `tier` with no environment overrides.
    pub fn for_tier(tier: Tier) -> Self {
        let preset = tier.preset();
        Self {
            tier,
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            local_root: PathBuf::from(preset.local_root),
            remote_root: preset.remote_root.to_string(),
            remote_backend: preset.remote_backend,
            propagation: preset.propagation,
            remote_timeout_secs: preset.remote_timeout_secs,
            remote_retry: RetryPolicy::new(preset.remote_retries),
            max_concurrent_transfers: preset.max_concurrent_transfers,
            gcs_api_base_url: GcsConfig::default().api_base_url,
            gcs_access_token: None,
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let tier = match get(ENV_TIER) {
            Some(value) => value.parse()?,
            None => Tier::Dev,
        };

        let mut settings = Self::for_tier(tier);
        if let Some(bucket) = get(ENV_BUCKET_NAME) {
            settings.bucket_name = bucket;
        }
        if let Some(local) = get(ENV_LOCAL_PACKAGE_DIRECTORY) {
            settings.local_root = PathBuf::from(local);
        }
        if let Some(remote) = get(ENV_REMOTE_PACKAGE_DIRECTORY) {
            settings.remote_root = remote;
        }
        if let Some(mode) = get(ENV_PROPAGATION_MODE) {
            settings.propagation = mode.parse()?;
        }
        if let Some(url) = get(ENV_GCS_API_BASE_URL) {
            settings.gcs_api_base_url = url.trim_end_matches('/').to_string();
        }
        settings.gcs_access_token = get(ENV_GCS_ACCESS_TOKEN);

        settings.validate()?;
        Ok(settings)
    }

    /// Checks invariants the presets cannot guarantee once overridden.
    pub fn validate(&self) -> SyncResult<()> {
        if self.local_root.as_os_str().is_empty() {
            return Err(SyncError::Config("local package directory is empty".into()));
        }
        if self.remote_backend == RemoteBackend::Gcs && self.bucket_name.trim().is_empty() {
            return Err(SyncError::Config("bucket name is empty".into()));
        }
        if self.remote_backend == RemoteBackend::Directory {
            let local = normalized(&self.local_root);
            let remote = normalized(Path::new(&self.remote_root));
            // The local walk is recursive, so a nested remote would be listed
            // as local artifacts (and the other way round).
            if local.starts_with(&remote) || remote.starts_with(&local) {
                return Err(SyncError::Config(format!(
                    "local and remote package directories must not contain each other: {} and {}",
                    self.local_root.display(),
                    self.remote_root
                )));
            }
        }
        Ok(())
    }

    /// Path or object prefix of the remote tier root, as used by the backend.
    pub fn remote_location(&self) -> String {
        match self.remote_backend {
            RemoteBackend::Directory => self.remote_root.clone(),
            RemoteBackend::Gcs => format!(
                "gs://{}/{}",
                self.bucket_name,
                self.remote_root.trim_matches('/')
            ),
        }
    }

    /// One-line summary for the startup log.
    pub fn describe(&self) -> String {
        format!(
            "tier={} local={} remote={} ({:?}) propagation={:?} max_transfers={}",
            self.tier,
            self.local_root.display(),
            self.remote_location(),
            self.remote_backend,
            self.propagation,
            self.max_concurrent_transfers
        )
    }

    /// Instantiates the two storage tiers described by these settings.
    pub fn build_tiers(&self) -> SyncResult<Tiers> {
        let local = Arc::new(LocalStorage::new(&self.local_root));
        let tiers = match self.remote_backend {
            RemoteBackend::Directory => Tiers::new(
                local,
                Arc::new(LocalStorage::named("remote-dir", &self.remote_root)),
            ),
            RemoteBackend::Gcs => {
                let gcs = GcsStorage::new(GcsConfig {
                    bucket: self.bucket_name.clone(),
                    root: self.remote_root.clone(),
                    api_base_url: self.gcs_api_base_url.clone(),
                    access_token: self.gcs_access_token.clone(),
                    timeout_secs: self.remote_timeout_secs,
                    retry: self.remote_retry,
                })?;
                Tiers::new(local, Arc::new(gcs))
            }
        };
        Ok(tiers)
    }
}

/// Lexical normalisation: drops `.` components and folds `..` where possible.
/// The directories may not exist yet, so the filesystem is not consulted.
fn normalized(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
