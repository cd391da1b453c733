//! pkgsync package server
//!
//! Serves a package index from a local directory and keeps that directory
//! in agreement with a remote object store. Configuration comes from the
//! environment (`TIER`, `BUCKET_NAME`, `LOCAL_PACKAGE_DIRECTORY`,
//! `REMOTE_PACKAGE_DIRECTORY`); process options come from the command line.
//!
//! Usage:
//!   pkgsync-server --port 8081

use anyhow::{Context, Result};
use clap::Parser;
use pkgsync_server::{AppState, build_router};
use pkgsync_storage::LocalStorage;
use pkgsync_sync::{GlobalSettings, RemoteBackend, SyncCoordinator};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "pkgsync-server")]
#[command(about = "Package index backed by a local cache and a remote object store")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP port
    #[arg(short, long, default_value = "8081")]
    port: u16,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let settings = GlobalSettings::from_env().context("Failed to load settings")?;
    info!("Configuration: {}", settings.describe());

    LocalStorage::new(&settings.local_root)
        .ensure_root()
        .await
        .context("Failed to create local package directory")?;
    if settings.remote_backend == RemoteBackend::Directory {
        LocalStorage::new(&settings.remote_root)
            .ensure_root()
            .await
            .context("Failed to create remote package directory")?;
    }

    let local_root = settings.local_root.display().to_string();
    let remote_location = settings.remote_location();
    let tier = settings.tier;

    let coordinator =
        SyncCoordinator::from_settings(settings).context("Failed to build storage tiers")?;
    let state = AppState::new(coordinator.tiers().local.clone(), Arc::new(coordinator));
    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!("\n========================================");
    println!("  pkgsync server running");
    println!("========================================");
    println!("  Tier:    {}", tier);
    println!("  Listen:  http://{}", addr);
    println!("  Local:   {}", local_root);
    println!("  Remote:  {}", remote_location);
    println!("========================================\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
