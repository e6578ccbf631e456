//! swcache server entry point.
//!
//! Boots the offline cache worker, installs and activates it, then serves it
//! as an MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{CacheManager, FetchConfig, HttpNetwork};
use swcache_core::{CacheDb, WorkerConfig};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load().context("loading configuration")?;
    tracing::info!(
        origin = %config.origin,
        version = %config.version,
        db_path = %config.db_path.display(),
        "Starting swcache server on stdio transport"
    );

    let store = CacheDb::open(&config.db_path)
        .await
        .context("opening cache database")?
        .with_quota(config.quota_bytes);
    let network = HttpNetwork::new(FetchConfig::from(&config), config.scope()?)?;
    let manager = CacheManager::new(config, store, Arc::new(network))?;

    // a failed lifecycle step leaves requests passing straight to the network
    match manager.install().await {
        Ok(_) => {
            if let Err(e) = manager.activate().await {
                tracing::error!("activation failed: {e}");
            }
        }
        Err(e) => tracing::error!("install failed: {e}"),
    }

    let handler = handler::SwcacheServer::new(manager);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
