use std::time::Duration;

use serde::Deserialize;

/// Outbound event stream configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    /// Minimum spacing between emitted events for selected clients
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// Event pacing applied to clients whose `User-Agent` matches
///
/// Pacing never changes event content or order. An interval of zero
/// disables it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacingConfig {
    /// Delay inserted between consecutive events
    #[serde(default = "default_interval", deserialize_with = "crate::deserialize_duration")]
    pub interval: Duration,
    /// Case-insensitive `User-Agent` substrings that enable pacing
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

impl PacingConfig {
    /// Pacing that never delays
    pub const fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            user_agents: Vec::new(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            user_agents: default_user_agents(),
        }
    }
}

const fn default_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_user_agents() -> Vec<String> {
    ["claude-code", "claude-cli", "anthropic-claude-code", "claude/desktop"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}
