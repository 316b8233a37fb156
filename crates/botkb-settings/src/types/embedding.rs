use serde::{Deserialize, Serialize};

/// Embedding backend configuration.
///
/// The backend is any server speaking the `OpenAI`-compatible
/// `POST /embeddings` protocol (a local sentence-transformers server, a
/// hosted API, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Base URL up to, not including, `/embeddings`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Name of the environment variable holding the bearer key, if any.
    pub api_key_env: Option<String>,
    /// Per-request HTTP timeout.
    pub timeout_ms: u64,
    /// Maximum texts per request.
    pub batch_size: usize,
    /// L2-normalize returned vectors.
    pub normalize: bool,
    /// Dimension used when probing the backend fails on a fresh tenant.
    pub fallback_dimensions: usize,
    /// Sentinel text embedded to discover the output dimension.
    pub probe_text: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            api_key_env: None,
            timeout_ms: 30_000,
            batch_size: 32,
            normalize: true,
            fallback_dimensions: 384,
            probe_text: "test".to_string(),
        }
    }
}
