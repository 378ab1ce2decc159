use std::net::SocketAddr;

use serde::Deserialize;

use crate::health::HealthConfig;

/// HTTP listener configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind; defaults to `127.0.0.1:10000`
    pub listen_address: Option<SocketAddr>,
    #[serde(default)]
    pub health: HealthConfig,
}
