//! HTTP error surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pkgsync_storage::StorageError;
use pkgsync_sync::SyncError;
use pkgsync_types::{ArtifactKey, KeyError, WriteKind};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid package path: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("malformed package path: {0}")]
    MalformedPath(String),

    #[error("package not found: {0}")]
    NotFound(ArtifactKey),

    #[error("no such project: {0}")]
    UnknownProject(String),

    #[error("package already exists: {0}")]
    AlreadyExists(ArtifactKey),

    /// The pre-request pass could not bring the local cache up to date.
    #[error("could not synchronise with remote storage: {0}")]
    Reconcile(SyncError),

    /// The local mutation succeeded but the remote tier was not updated.
    #[error("{key} was {} locally but remote propagation did not complete: {source}", past_tense(.kind))]
    Propagation {
        key: ArtifactKey,
        kind: WriteKind,
        source: SyncError,
    },

    #[error("local storage failure: {0}")]
    Local(StorageError),
}

fn past_tense(kind: &WriteKind) -> &'static str {
    match kind {
        WriteKind::Create => "stored",
        WriteKind::Delete => "removed",
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidKey(_) | ApiError::MalformedPath(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::UnknownProject(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::Reconcile(SyncError::Key(_)) => StatusCode::BAD_REQUEST,
            ApiError::Reconcile(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Reconcile(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Propagation { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Local(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ApiError::NotFound(key),
            StorageError::InvalidKey(e) => ApiError::InvalidKey(e),
            other => ApiError::Local(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "{self}");
        } else {
            debug!(status = status.as_u16(), "{self}");
        }
        (status, self.to_string()).into_response()
    }
}
