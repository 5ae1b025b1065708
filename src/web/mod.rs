//! Web layer module
//!
//! The gateway serves a single endpoint of its own (`/MediaWarp/health`);
//! every other request falls through to [`Gateway::handle`], which either
//! intercepts it or proxies it to the media server unchanged.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::{config::Config, gateway::Gateway};

pub mod handlers;
pub mod middleware;

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, gateway: Arc<Gateway>) -> Result<Self> {
        let app = Self::create_router(AppState {
            gateway,
            started_at: Instant::now(),
        });

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

        Ok(Self { app, addr })
    }

    /// Create the router with the gateway's own routes, the proxy fallback and middleware
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/MediaWarp/health", get(handlers::health_check))
            // Applies to the routes above only, never to proxied requests
            .route_layer(CorsLayer::permissive())
            .fallback(handlers::gateway_fallback)
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .with_state(state)
    }

    /// Start the web server, stopping on Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub started_at: Instant,
}
