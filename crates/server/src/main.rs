//! sitecache server entry point.
//!
//! Boots a worker for the configured site, installs and activates it, then
//! exposes it as an MCP server on stdio. Logging goes to stderr so it never
//! interleaves with the JSON-RPC stream on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sitecache_client::{FetchConfig, HttpNetwork, SystemClock, Worker};
use sitecache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let worker_config = config.worker_config()?;

    tracing::info!(
        origin = %worker_config.origin,
        version = %worker_config.version,
        db_path = %config.db_path.display(),
        "Starting sitecache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let network = HttpNetwork::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        timeout: config.fetch_timeout(),
        ..Default::default()
    })?;

    let worker = Arc::new(Worker::new(worker_config, db, Arc::new(network), Arc::new(SystemClock)));
    if let Err(e) = worker.start().await {
        // the server still answers; requests pass straight to the network
        tracing::error!(error = %e, "worker failed to start");
    }

    let handler = handler::SiteCacheServer::new(worker);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
