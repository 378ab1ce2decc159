#![allow(clippy::must_use_candidate)]

pub mod backend;
mod env;
pub mod health;
mod loader;
pub mod server;
pub mod streaming;
pub mod telemetry;

use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub use backend::*;
pub use health::*;
pub use server::*;
pub use streaming::*;
pub use telemetry::*;

/// Top-level Switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat-completions backend configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Outbound event stream configuration
    #[serde(default)]
    pub streaming: StreamingConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Deserialize a human-readable duration such as `"10ms"` or `"2m"`
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
}
