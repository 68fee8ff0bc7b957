use std::sync::Arc;

use ephemera_store::EphemeralStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::router::build_router;
use crate::state::AppState;

/// Ephemera HTTP server.
pub struct EphemeraServer {
    config: ServerConfig,
    store: Arc<EphemeralStore>,
}

impl EphemeraServer {
    pub fn new(config: ServerConfig, store: Arc<EphemeralStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(
            Arc::clone(&self.store),
            self.config.public_base_url.as_str(),
        ))
    }

    /// Serve requests until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("Ephemera server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| crate::error::ServerError::Internal(e.to_string()))
    }
}
