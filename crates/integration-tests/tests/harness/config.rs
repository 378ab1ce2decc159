//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use secrecy::SecretString;
use switchboard_config::{
    BackendConfig, Config, HealthConfig, PacingConfig, ServerConfig, StreamingConfig, TelemetryConfig,
};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal config pointed at a mock backend, with pacing disabled
    pub fn new(backend_url: &str) -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                },
                backend: BackendConfig {
                    base_url: backend_url.parse().expect("valid URL"),
                    api_key: Some(SecretString::from("test-key")),
                    ..BackendConfig::default()
                },
                streaming: StreamingConfig {
                    pacing: PacingConfig::disabled(),
                },
                telemetry: TelemetryConfig::default(),
            },
        }
    }

    /// Map a client model name to a backend model
    pub fn with_model_mapping(mut self, client: &str, backend: &str) -> Self {
        self.config
            .backend
            .models
            .mappings
            .insert(client.to_owned(), backend.to_owned());
        self
    }

    /// Set the pacing configuration
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.config.streaming.pacing = pacing;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
