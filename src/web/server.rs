//! Web server for hybrid-storage.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::storage::FileStorageBackend;
use crate::{Error, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_router};

/// HTTP server exposing one storage backend.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// CORS allowed origins.
    cors_origins: Vec<String>,
    /// Upper bound for one request.
    request_timeout: Duration,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, backend: Arc<dyn FileStorageBackend>) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid server address: {e}")))?;

        let app_state = AppState::new(backend)
            .with_upload_config(config.upload.clone())
            .with_pagination_config(config.pagination.clone());

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            cors_origins: config.web.cors_origins.clone(),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the complete router.
    pub fn router(&self) -> Router {
        create_router(
            Arc::clone(&self.app_state),
            &self.cors_origins,
            self.request_timeout,
        )
        .merge(create_health_router())
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            backend = self.app_state.backend.name(),
            "Web server listening on http://{}",
            local_addr
        );

        axum::serve(listener, router).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
