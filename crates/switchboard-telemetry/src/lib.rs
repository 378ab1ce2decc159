//! Logging setup for Switchboard
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a
//! text or JSON `fmt` layer.

use switchboard_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Build the log filter, letting `RUST_LOG` override the configured directive
fn build_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber from configuration
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let filter = build_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);

            registry
                .with(fmt_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true);

            registry
                .with(fmt_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
        }
    }

    tracing::debug!(format = ?config.format, "logging initialized");

    Ok(())
}
