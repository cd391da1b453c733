//! Reconciliation around requests.

use crate::AppState;
use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pkgsync_sync::RequestScope;
use pkgsync_types::{ArtifactKey, WriteKind};
use tracing::debug;

/// Maps a request to the reconciliation scope it needs, or `None` when the
/// request touches no package data.
pub fn request_scope(method: &Method, path: &str) -> Result<Option<RequestScope>, ApiError> {
    if let Some(rest) = path.strip_prefix("/packages/") {
        if rest.is_empty() {
            return Ok(is_read(method).then(RequestScope::listing));
        }
        if !is_read(method) && write_kind(method).is_none() {
            return Ok(None);
        }
        let decoded =
            urlencoding::decode(rest).map_err(|_| ApiError::MalformedPath(path.to_string()))?;
        let key = ArtifactKey::parse(decoded.into_owned())?;
        return Ok(Some(RequestScope::Artifact(key)));
    }
    if path.starts_with("/simple/") && is_read(method) {
        return Ok(Some(RequestScope::listing()));
    }
    Ok(None)
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

fn write_kind(method: &Method) -> Option<WriteKind> {
    if *method == Method::PUT {
        Some(WriteKind::Create)
    } else if *method == Method::DELETE {
        Some(WriteKind::Delete)
    } else {
        None
    }
}

/// Runs the pre-request hook, the route, then the post-write hook for
/// successful mutations.
pub async fn sync_hooks(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let scope = match request_scope(&method, req.uri().path()) {
        Ok(Some(scope)) => scope,
        Ok(None) => return next.run(req).await,
        Err(err) => return err.into_response(),
    };

    debug!(method = %method, scope = ?scope, "pre-request sync");
    if let Err(err) = state.hooks.before_request(&scope).await {
        return ApiError::Reconcile(err).into_response();
    }

    let response = next.run(req).await;

    let (Some(kind), RequestScope::Artifact(key)) = (write_kind(&method), scope) else {
        return response;
    };
    if !response.status().is_success() {
        return response;
    }
    match state.hooks.after_write(&key, kind).await {
        Ok(()) => response,
        Err(source) => ApiError::Propagation { key, kind, source }.into_response(),
    }
}
