//! offgrid host entry point.
//!
//! Loads configuration, brings the current cache generation up and then
//! serves every request through the offline cache proxy.
//! Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use offgrid_client::{FetchClient, FetchConfig};
use offgrid_core::{AppConfig, CacheDb, OfflineCacheProxy, ProxyConfig};

mod error;
mod handler;
mod lifecycle;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, "starting offgrid");

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let fetcher = FetchClient::new(FetchConfig::from_app(&config))?;
    let proxy = Arc::new(OfflineCacheProxy::new(ProxyConfig::from_app(&config)?, fetcher, db.clone()));

    let deleted = lifecycle::bring_up(proxy.as_ref(), &lifecycle::RetryPolicy::from_app(&config)).await?;
    tracing::info!(namespace = %proxy.config().namespace(), evicted = deleted.len(), "generation active");

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, handler::router(handler::AppState::new(proxy, db)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
