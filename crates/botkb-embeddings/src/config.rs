//! HTTP embedding client configuration.

use std::fmt;
use std::time::Duration;

use botkb_settings::EmbeddingSettings;

/// Configuration for [`HttpEmbeddingService`](crate::HttpEmbeddingService).
#[derive(Clone)]
pub struct EmbeddingConfig {
    /// Base URL up to, not including, `/embeddings`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Bearer key, if the backend requires one.
    pub api_key: Option<String>,
    /// Per-request HTTP timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum texts per request.
    pub batch_size: usize,
    /// L2-normalize returned vectors.
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_settings(&EmbeddingSettings::default())
    }
}

impl EmbeddingConfig {
    /// Create config from settings, resolving the API key from the
    /// environment variable the settings name.
    pub fn from_settings(s: &EmbeddingSettings) -> Self {
        let api_key = s
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty());
        Self {
            base_url: s.base_url.trim_end_matches('/').to_string(),
            model: s.model.clone(),
            api_key,
            timeout_ms: s.timeout_ms,
            batch_size: s.batch_size.max(1),
            normalize: s.normalize,
        }
    }

    /// Full URL of the embeddings endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("batch_size", &self.batch_size)
            .field("normalize", &self.normalize)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_default_settings() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.model, "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, 32);
        assert!(config.normalize);
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let settings = EmbeddingSettings {
            base_url: "http://embed.local/v1/".to_string(),
            ..EmbeddingSettings::default()
        };
        let config = EmbeddingConfig::from_settings(&settings);
        assert_eq!(config.endpoint(), "http://embed.local/v1/embeddings");
    }

    #[test]
    fn missing_key_env_yields_none() {
        let settings = EmbeddingSettings {
            api_key_env: Some("BOTKB_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..EmbeddingSettings::default()
        };
        assert!(EmbeddingConfig::from_settings(&settings).api_key.is_none());
    }

    #[test]
    fn debug_redacts_key() {
        let config = EmbeddingConfig {
            api_key: Some("sk-secret".to_string()),
            ..EmbeddingConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
