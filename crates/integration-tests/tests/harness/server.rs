//! Test server wrapper that starts Switchboard on a random port

use std::net::SocketAddr;

use switchboard_config::Config;
use switchboard_server::Server;
use tokio_util::sync::CancellationToken;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let server = Server::new(&config)?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            client: reqwest::Client::new(),
        })
    }

    /// URL of a path on the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// POST a Messages request and return the response
    pub async fn post_messages(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/v1/messages"))
            .json(body)
            .send()
            .await
            .expect("request reaches test server")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
