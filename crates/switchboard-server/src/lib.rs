mod health;
mod request_context;

use std::net::SocketAddr;

use axum::Router;
use switchboard_adapter::AdapterState;
use switchboard_config::Config;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be constructed
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let state = AdapterState::from_config(&config.backend, &config.streaming)?;
        Ok(Self::with_state(config, state))
    }

    /// Build the server around an existing adapter state
    #[must_use]
    pub fn with_state(config: &Config, state: AdapterState) -> Self {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 10000)));

        let mut app = Router::new();

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(switchboard_adapter::adapter_router(state));

        // Innermost first: the context must exist before handlers run
        app = app.layer(axum::middleware::from_fn(request_context::request_context_middleware));
        app = app.layer(TraceLayer::new_for_http());

        Self {
            router: app,
            listen_address,
        }
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "switchboard listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
