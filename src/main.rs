//! Race Analytics - Main Application Entry Point
//!
//! REST API server for motorsport statistics: circuits, drivers,
//! constructors, races, and per-race result rows, with user accounts, an
//! admin back-office, and comparison endpoints. See the library crate for
//! the router and the pooled data-access layer.

use tracing_subscriber::EnvFilter;

use race_analytics_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    race_analytics_server::run(config).await
}
