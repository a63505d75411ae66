//! offcache server entry point.
//!
//! Loads configuration, opens the bucket store, installs and activates the
//! current version, then serves the router's tools over MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offcache_client::{FetchClient, FetchConfig, Fetcher, Router, spawn_control_loop};
use offcache_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, "Starting offcache server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let router = Router::new(&config, fetcher, db)?;

    let report = router.install().await;
    if !report.is_complete() {
        tracing::warn!(failed = report.failed.len(), "installed without pre-cached assets");
    }
    router.activate().await?;

    let (control, _control_task) = spawn_control_loop(router.clone());
    let handler = handler::OffcacheServer::new(router, control);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
