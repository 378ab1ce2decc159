use std::path::Path;
use std::time::Duration;

use crate::Config;

/// Upper bound for event pacing
const MAX_PACING_INTERVAL: Duration = Duration::from_secs(1);

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_backend()?;
        self.validate_streaming()?;
        Ok(())
    }

    fn validate_backend(&self) -> anyhow::Result<()> {
        let backend = &self.backend;

        if !matches!(backend.base_url.scheme(), "http" | "https") {
            anyhow::bail!("backend.base_url must use http or https, got '{}'", backend.base_url.scheme());
        }

        if backend.default_max_tokens == 0 {
            anyhow::bail!("backend.default_max_tokens must be greater than 0");
        }

        if backend.request_timeout.is_zero() {
            anyhow::bail!("backend.request_timeout must be greater than 0");
        }

        if backend.models.default.as_deref().is_some_and(|model| model.trim().is_empty()) {
            anyhow::bail!("backend.models.default must not be empty");
        }

        for (from, to) in &backend.models.mappings {
            if from.trim().is_empty() || to.trim().is_empty() {
                anyhow::bail!("backend.models.mappings entries must have non-empty names ('{from}' -> '{to}')");
            }
        }

        Ok(())
    }

    fn validate_streaming(&self) -> anyhow::Result<()> {
        let pacing = &self.streaming.pacing;

        if pacing.interval > MAX_PACING_INTERVAL {
            anyhow::bail!(
                "streaming.pacing.interval must be at most {}ms",
                MAX_PACING_INTERVAL.as_millis()
            );
        }

        if pacing.user_agents.iter().any(|agent| agent.trim().is_empty()) {
            anyhow::bail!("streaming.pacing.user_agents must not contain empty entries");
        }

        Ok(())
    }
}
