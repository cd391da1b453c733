//! Filesystem storage tier.
//!
//! Serves as the local package cache and, in the dev tier, as a stand-in
//! for the remote object store (a second directory on the same machine).

use crate::client::StorageClient;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkgsync_types::{ArtifactKey, ArtifactRecord};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of in-flight temporary files. Listings never report them.
pub const TEMP_FILE_PREFIX: &str = ".pkgsync-tmp-";

/// A directory tree holding one file per artifact key.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    name: &'static str,
    root: PathBuf,
}

impl LocalStorage {
    /// Creates the local cache tier rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::named("local", root)
    }

    /// Creates a filesystem tier with a custom name for logs, e.g. `"remote-dir"`
    /// when a directory plays the remote role.
    pub fn named(name: &'static str, root: impl Into<PathBuf>) -> Self {
        Self {
            name,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key` below the root.
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.segments() {
            path.push(segment);
        }
        path
    }

    /// Creates the root directory if it does not exist.
    pub async fn ensure_root(&self) -> StorageResult<()> {
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            fs::create_dir_all(&self.root).await.map_err(|e| {
                StorageError::from_io_unkeyed(e, &format!("create root {:?}", self.root))
            })?;
            info!("Created {} storage root: {:?}", self.name, self.root);
        }
        Ok(())
    }

    fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    fn record_from_metadata(key: ArtifactKey, metadata: &std::fs::Metadata) -> ArtifactRecord {
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        ArtifactRecord::present(key, metadata.len(), modified)
    }

    /// Walks the tree below the root, collecting every regular file.
    ///
    /// The walk is recursive: nested keys such as `team/demo.whl` live in
    /// subdirectories. Hidden entries are skipped, which also hides
    /// in-flight temporary files.
    async fn walk(&self) -> StorageResult<Vec<ArtifactRecord>> {
        let mut records = Vec::new();
        let mut pending: Vec<(PathBuf, String)> = vec![(self.root.clone(), String::new())];

        while let Some((dir, relative)) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                // Root missing or a subdirectory removed mid-walk.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                // Only the root has to be readable; a foreign subdirectory
                // we cannot enter holds no artifacts of ours.
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied && dir != self.root => {
                    warn!("Skipping unreadable directory {:?}: {e}", dir);
                    continue;
                }
                Err(e) => {
                    return Err(StorageError::from_io_unkeyed(
                        e,
                        &format!("read directory {dir:?}"),
                    ));
                }
            };

            while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
                StorageError::from_io_unkeyed(e, &format!("read directory entry in {dir:?}"))
            })? {
                let name = entry.file_name().to_string_lossy().to_string();
                if Self::is_hidden(&name) {
                    continue;
                }

                let path = entry.path();
                let metadata = match fs::metadata(&path).await {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        warn!("Skipping {:?}: {e}", path);
                        continue;
                    }
                };

                let key_str = if relative.is_empty() {
                    name
                } else {
                    format!("{relative}/{name}")
                };

                if metadata.is_dir() {
                    pending.push((path, key_str));
                } else if metadata.is_file() {
                    match ArtifactKey::parse(key_str) {
                        Ok(key) => records.push(Self::record_from_metadata(key, &metadata)),
                        Err(e) => warn!("Skipping file with unusable name: {e}"),
                    }
                }
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    fn tier_name(&self) -> &'static str {
        self.name
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<ArtifactRecord>> {
        let mut records = self.walk().await?;
        if let Some(prefix) = prefix {
            records.retain(|record| record.key.has_prefix(prefix));
        }
        debug!("Listed {} artifacts in {:?}", records.len(), self.root);
        Ok(records)
    }

    async fn stat(&self, key: &ArtifactKey) -> StorageResult<Option<ArtifactRecord>> {
        match fs::metadata(self.path_for(key)).await {
            Ok(metadata) if metadata.is_file() => {
                Ok(Some(Self::record_from_metadata(key.clone(), &metadata)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from_io(e, key, "stat")),
        }
    }

    async fn read(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>> {
        fs::read(self.path_for(key))
            .await
            .map_err(|e| StorageError::from_io(e, key, "read"))
    }

    async fn write(&self, key: &ArtifactKey, content: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();

        fs::create_dir_all(&parent)
            .await
            .map_err(|e| StorageError::from_io(e, key, "create directory for"))?;

        // Write beside the target and rename so readers never see a partial file.
        let temp = parent.join(format!("{TEMP_FILE_PREFIX}{}", Uuid::new_v4()));
        if let Err(e) = fs::write(&temp, content).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::from_io(e, key, "write"));
        }
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::from_io(e, key, "rename into place"));
        }

        debug!(
            "Wrote {} bytes to {} tier: {:?}",
            content.len(),
            self.name,
            path
        );
        Ok(())
    }

    async fn delete(&self, key: &ArtifactKey) -> StorageResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted from {} tier: {:?}", self.name, path);
                Ok(())
            }
            // Already gone is fine for delete.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, key, "delete")),
        }
    }
}
