//! Per-client event pacing

use std::time::Duration;

use switchboard_config::PacingConfig;

/// Minimum spacing between outbound stream events, chosen by `User-Agent`
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    interval: Duration,
    /// Lowercased `User-Agent` substrings
    user_agents: Vec<String>,
}

impl PacingPolicy {
    pub fn from_config(config: &PacingConfig) -> Self {
        Self {
            interval: config.interval,
            user_agents: config
                .user_agents
                .iter()
                .map(|agent| agent.to_ascii_lowercase())
                .collect(),
        }
    }

    /// A policy that never delays
    pub const fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            user_agents: Vec::new(),
        }
    }

    /// Spacing for a request with the given `User-Agent`; zero means none
    pub fn interval_for(&self, user_agent: Option<&str>) -> Duration {
        if self.interval.is_zero() {
            return Duration::ZERO;
        }

        let Some(user_agent) = user_agent else {
            return Duration::ZERO;
        };
        let user_agent = user_agent.to_ascii_lowercase();

        if self.user_agents.iter().any(|agent| user_agent.contains(agent.as_str())) {
            self.interval
        } else {
            Duration::ZERO
        }
    }
}
