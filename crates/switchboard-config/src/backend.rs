use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Default chat-completions API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default output-token bound when a client request omits `max_tokens`
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Configuration for the chat-completions backend
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL; `/chat/completions` and `/models` are appended
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Bearer token sent to the backend
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Total time allowed for a backend request, including the stream body
    #[serde(default = "default_request_timeout", deserialize_with = "crate::deserialize_duration")]
    pub request_timeout: Duration,
    /// Time allowed to establish the backend connection
    #[serde(default = "default_connect_timeout", deserialize_with = "crate::deserialize_duration")]
    pub connect_timeout: Duration,
    /// Ask the backend to append a usage chunk to streamed responses
    #[serde(default = "default_stream_usage")]
    pub stream_usage: bool,
    /// Output-token bound applied when the client omits one
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    /// Model name translation
    #[serde(default)]
    pub models: ModelsConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            stream_usage: default_stream_usage(),
            default_max_tokens: default_max_tokens(),
            models: ModelsConfig::default(),
        }
    }
}

/// Client model name to backend model name translation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    /// Backend model used when no mapping matches
    #[serde(default)]
    pub default: Option<String>,
    /// Exact-match client model → backend model
    #[serde(default)]
    pub mappings: IndexMap<String, String>,
}

impl ModelsConfig {
    /// Resolve the backend model for a client-requested model
    pub fn resolve<'a>(&'a self, requested: &'a str) -> &'a str {
        self.mappings
            .get(requested)
            .or(self.default.as_ref())
            .map_or(requested, String::as_str)
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("valid default URL")
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(600)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_stream_usage() -> bool {
    true
}

const fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_wins_over_default() {
        let mut models = ModelsConfig {
            default: Some("gpt-4o-mini".to_owned()),
            ..ModelsConfig::default()
        };
        models
            .mappings
            .insert("claude-3-5-sonnet-20241022".to_owned(), "gpt-4o".to_owned());

        assert_eq!(models.resolve("claude-3-5-sonnet-20241022"), "gpt-4o");
        assert_eq!(models.resolve("claude-3-haiku"), "gpt-4o-mini");
    }

    #[test]
    fn unmapped_model_passes_through() {
        let models = ModelsConfig::default();
        assert_eq!(models.resolve("my-local-model"), "my-local-model");
    }

    #[test]
    fn defaults_point_at_public_api() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url.as_str(), "https://api.openai.com/v1");
        assert_eq!(config.default_max_tokens, DEFAULT_MAX_TOKENS);
        assert!(config.stream_usage);
    }
}
