//! larder server entry point.
//!
//! Boots the proxy (config, cache database, first worker, sync hooks) and
//! serves it on the MCP stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use larder_client::{FetchClient, FetchConfig};
use larder_core::config::AppConfig;
use larder_core::sync::PeriodicSyncJob;
use larder_core::{CacheDb, Network, Registration, Worker};

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let settings = config.worker_settings()?;

    tracing::info!(version = %config.cache_version, origin = %settings.origin, "Starting larder on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })?);

    let registration = Arc::new(Registration::new());
    let worker = Worker::new(config.cache_version(), db, network.clone(), settings.clone())?;
    if let Some(report) = registration.register(Arc::new(worker)).await?
        && let Some(failure) = &report.failure
    {
        tracing::warn!(error = %failure, "stale cache cleanup incomplete");
    }

    let hooks = Arc::new(state::build_hooks(&config, &settings.origin, network, registration.clone())?);

    let shutdown = CancellationToken::new();
    let periodic = Arc::new(
        PeriodicSyncJob::new(hooks.clone())
            .with_interval(config.periodic_sync_interval())
            .with_cancellation(shutdown.clone()),
    )
    .start();

    let state = Arc::new(state::ProxyState { registration: registration.clone(), hooks, origin: settings.origin.clone() });
    let handler = handler::LarderServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    shutdown.cancel();
    periodic.await?;
    if let Some(worker) = registration.active().await {
        worker.settle().await;
    }

    Ok(())
}
