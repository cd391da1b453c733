//! Google Cloud Storage tier.
//!
//! Talks to the Cloud Storage JSON API v1. Every artifact is one object named
//! `{root}/{key}` inside the configured bucket.

use crate::client::StorageClient;
use crate::error::{StorageError, StorageResult};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use pkgsync_types::{ArtifactKey, ArtifactRecord};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Google Cloud Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsConfig {
    /// Bucket holding the packages.
    pub bucket: String,
    /// Object-name prefix acting as the package directory.
    pub root: String,
    /// Base URL of the JSON API (e.g. `https://storage.googleapis.com`).
    pub api_base_url: String,
    /// OAuth2 bearer token. Requests are sent unauthenticated when unset.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            root: "packages".to_string(),
            api_base_url: "https://storage.googleapis.com".to_string(),
            access_token: None,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<GcsObject>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GcsObject {
    name: String,
    /// Decimal string, as the API sends it.
    size: Option<String>,
    /// RFC 3339 timestamp.
    updated: Option<String>,
}

/// Cloud Storage implementation of [`StorageClient`].
pub struct GcsStorage {
    config: GcsConfig,
    client: Client,
}

impl GcsStorage {
    /// Creates a client for the configured bucket.
    pub fn new(config: GcsConfig) -> StorageResult<Self> {
        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket name is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GcsConfig {
        &self.config
    }

    fn object_name(&self, key: &ArtifactKey) -> String {
        key.under_root(&self.config.root)
    }

    fn object_url(&self, key: &ArtifactKey) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.config.api_base_url,
            urlencoding::encode(&self.config.bucket),
            urlencoding::encode(&self.object_name(key))
        )
    }

    fn list_prefix(&self, prefix: Option<&str>) -> String {
        let root = self.config.root.trim_matches('/');
        let prefix = prefix.unwrap_or("");
        if root.is_empty() {
            prefix.to_string()
        } else {
            format!("{root}/{prefix}")
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(what: &str, e: reqwest::Error) -> StorageError {
        StorageError::Transient(format!("{what} failed: {e}"))
    }

    /// A success status with a body that is not the expected JSON. Repeating
    /// the request would not help.
    fn decode_error(what: &str, status: StatusCode, e: reqwest::Error) -> StorageError {
        StorageError::Remote {
            status: status.as_u16(),
            message: format!("{what} failed: {e}"),
        }
    }

    async fn status_error(what: &str, response: Response) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = format!("{what} failed: {body}");

        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            StorageError::Transient(format!("{status} {message}"))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            StorageError::PermissionDenied(format!("{status} {message}"))
        } else {
            StorageError::Remote {
                status: status.as_u16(),
                message,
            }
        }
    }

    fn object_to_record(&self, object: GcsObject) -> StorageResult<Option<ArtifactRecord>> {
        // "Directory" placeholder objects.
        if object.name.ends_with('/') {
            return Ok(None);
        }

        let key = ArtifactKey::strip_root(&object.name, &self.config.root)?;
        let size = object.size.and_then(|s| s.parse().ok());
        let modified = object.updated.and_then(|t| {
            chrono::DateTime::parse_from_rfc3339(&t)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc))
        });

        Ok(Some(ArtifactRecord {
            key,
            exists: true,
            size,
            modified,
            tombstone: false,
        }))
    }

    async fn list_page(&self, prefix: &str, page_token: Option<&str>) -> StorageResult<ObjectList> {
        let mut request = self
            .authorize(self.client.get(format!(
                "{}/storage/v1/b/{}/o",
                self.config.api_base_url,
                urlencoding::encode(&self.config.bucket)
            )))
            .query(&[("prefix", prefix)]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::transport_error("object list", e))?;

        if !response.status().is_success() {
            return Err(Self::status_error("object list", response).await);
        }

        let status = response.status();
        response
            .json()
            .await
            .map_err(|e| Self::decode_error("parse object list", status, e))
    }

    async fn stat_once(&self, key: &ArtifactKey) -> StorageResult<Option<ArtifactRecord>> {
        let response = self
            .authorize(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| Self::transport_error("object metadata", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::status_error("object metadata", response).await);
        }

        let status = response.status();
        let object: GcsObject = response
            .json()
            .await
            .map_err(|e| Self::decode_error("parse object metadata", status, e))?;
        self.object_to_record(object)
    }

    async fn read_once(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>> {
        let response = self
            .authorize(self.client.get(self.object_url(key)))
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Self::transport_error("download", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.clone()));
        }
        if !response.status().is_success() {
            return Err(Self::status_error("download", response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error("read download body", e))?;
        Ok(bytes.to_vec())
    }

    async fn write_once(&self, key: &ArtifactKey, content: &[u8]) -> StorageResult<()> {
        let object_name = self.object_name(key);
        let response = self
            .authorize(self.client.post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.config.api_base_url,
                urlencoding::encode(&self.config.bucket)
            )))
            .query(&[("uploadType", "media"), ("name", object_name.as_str())])
            .header("Content-Type", "application/octet-stream")
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| Self::transport_error("upload", e))?;

        if !response.status().is_success() {
            return Err(Self::status_error("upload", response).await);
        }
        Ok(())
    }

    async fn delete_once(&self, key: &ArtifactKey) -> StorageResult<()> {
        let response = self
            .authorize(self.client.delete(self.object_url(key)))
            .send()
            .await
            .map_err(|e| Self::transport_error("delete", e))?;

        // Already gone is fine for delete.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::status_error("delete", response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for GcsStorage {
    fn tier_name(&self) -> &'static str {
        "gcs"
    }

    fn location(&self) -> String {
        format!("gs://{}/{}", self.config.bucket, self.config.root.trim_matches('/'))
    }

    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<ArtifactRecord>> {
        let list_prefix = self.list_prefix(prefix);
        let retry = self.config.retry;

        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = retry
                .run("gcs list", || self.list_page(&list_prefix, page_token.as_deref()))
                .await?;

            for object in page.items {
                match self.object_to_record(object) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping remote object: {e}"),
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!("Listed {} objects under {}", records.len(), list_prefix);
        Ok(records)
    }

    async fn stat(&self, key: &ArtifactKey) -> StorageResult<Option<ArtifactRecord>> {
        self.config
            .retry
            .run("gcs stat", || self.stat_once(key))
            .await
    }

    async fn read(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>> {
        debug!("Downloading object: {}", self.object_name(key));
        self.config
            .retry
            .run("gcs download", || self.read_once(key))
            .await
    }

    async fn write(&self, key: &ArtifactKey, content: &[u8]) -> StorageResult<()> {
        debug!(
            "Uploading object: {} ({} bytes)",
            self.object_name(key),
            content.len()
        );
        self.config
            .retry
            .run("gcs upload", || self.write_once(key, content))
            .await?;
        info!("Uploaded object: {}", self.object_name(key));
        Ok(())
    }

    async fn delete(&self, key: &ArtifactKey) -> StorageResult<()> {
        self.config
            .retry
            .run("gcs delete", || self.delete_once(key))
            .await?;
        info!("Deleted object: {}", self.object_name(key));
        Ok(())
    }
}
