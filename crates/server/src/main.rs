//! Trending token aggregator
//!
//! Main entry point for the HTTP server

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trending_core::AppConfig;
use trending_feed::{
    AggregatorConfig, HttpTrendingSource, TokenState, TrendingAggregator, UpdateBroadcaster,
};
use trending_server::{AppState, HttpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting trending aggregator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::from_env()?;
    info!(
        "Upstream {} ({} windows, limit {}, every {:?})",
        config.upstream.base_url,
        config.aggregation.windows.len(),
        config.aggregation.limit,
        config.aggregation.interval()
    );

    // Build the pipeline
    let source = Arc::new(HttpTrendingSource::new(config.upstream.clone())?);
    let state = Arc::new(TokenState::new());
    let broadcaster = Arc::new(UpdateBroadcaster::new(config.broadcast.capacity, Arc::clone(&state)));

    let mut aggregator = TrendingAggregator::new(
        AggregatorConfig::from(&config),
        source,
        state,
        broadcaster,
    );

    let app_state = AppState::new(&aggregator, config.query.clone());

    // Start background services
    aggregator.start().await?;
    info!("Background services started");

    let server = HttpServer::new(config.server.clone(), app_state);

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        let _ = shutdown_tx.send(());
    });

    // Start server
    info!("HTTP server listening on {}", server.address());
    info!("Press Ctrl+C to shutdown");

    let result = server.start_with_shutdown(shutdown_rx).await;
    aggregator.stop().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("Server shutdown complete");
    Ok(())
}
