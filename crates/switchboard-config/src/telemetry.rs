use serde::Deserialize;

/// Logging configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Output format for log lines
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

fn default_log_filter() -> String {
    "info".to_owned()
}
