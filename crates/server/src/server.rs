//! HTTP server configuration and startup

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

use trending_core::ServerConfig;

use crate::service::{create_router, AppState};

/// HTTP server wrapper
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` fires
    pub async fn start_with_shutdown(&self, shutdown: oneshot::Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.address()).await?;

        info!("Starting HTTP server on {} (with graceful shutdown)", listener.local_addr()?);
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener, shutdown: oneshot::Receiver<()>) -> anyhow::Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                shutdown.await.ok();
                info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }

    /// Get server address
    pub fn address(&self) -> String {
        self.config.address()
    }
}
