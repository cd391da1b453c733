//! # pkgsync-server
//!
//! A minimal package index serving files from the local tier. Reconciliation
//! with the remote tier is composed around the routes as middleware, so the
//! handlers never see the remote store.

mod error;
mod handlers;
mod middleware;
pub mod project;

pub use error::ApiError;
pub use middleware::request_scope;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use pkgsync_storage::StorageClient;
use pkgsync_sync::SyncHooks;
use std::sync::Arc;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    /// The tier every handler reads from and writes to.
    pub local: Arc<dyn StorageClient>,
    pub hooks: Arc<dyn SyncHooks>,
}

impl AppState {
    pub fn new(local: Arc<dyn StorageClient>, hooks: Arc<dyn SyncHooks>) -> Self {
        Self { local, hooks }
    }
}

/// Build the HTTP router. Every route except `/health` runs behind the
/// sync hooks.
pub fn build_router(state: AppState) -> Router {
    let synced = Router::new()
        .route("/packages/", get(handlers::packages_index))
        .route(
            "/packages/{*path}",
            get(handlers::get_package)
                .put(handlers::put_package)
                .delete(handlers::delete_package),
        )
        .route("/simple/", get(handlers::simple_index))
        .route("/simple/{project}/", get(handlers::simple_project))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::sync_hooks,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(synced)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
