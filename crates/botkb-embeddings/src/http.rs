//! `OpenAI`-compatible embedding client.
//!
//! Sends `POST {base_url}/embeddings` with `{"model", "input": [...]}` and
//! reads `data[].embedding`, reordered by `data[].index`. Inputs larger than
//! the configured batch size are split into several requests.
//!
//! The output dimension is frozen on the first successful call; any later
//! vector of a different length fails with
//! [`EmbeddingError::DimensionDrift`] instead of reaching an index.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::errors::{EmbeddingError, Result};
use crate::normalize::l2_normalize;
use crate::service::EmbeddingService;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding service backed by an HTTP endpoint.
pub struct HttpEmbeddingService {
    client: reqwest::Client,
    config: EmbeddingConfig,
    dims: OnceLock<usize>,
    healthy: AtomicBool,
}

impl HttpEmbeddingService {
    /// Build a client for the given config.
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(EmbeddingError::Config("embedding base URL is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            dims: OnceLock::new(),
            healthy: AtomicBool::new(true),
        })
    }

    /// The config this client was built with.
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut request = self
            .client
            .post(self.config.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: batch,
            });
        if let Some(key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message: parse_api_error(&body),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != batch.len() {
            return Err(EmbeddingError::Inference(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(batch.len());
        for datum in parsed.data {
            let mut v = datum.embedding;
            if v.is_empty() {
                return Err(EmbeddingError::Inference("empty embedding vector".into()));
            }
            self.check_dimension(v.len())?;
            if self.config.normalize {
                l2_normalize(&mut v);
            }
            vectors.push(v);
        }
        Ok(vectors)
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        let expected = *self.dims.get_or_init(|| {
            debug!(dims = actual, model = %self.config.model, "embedding dimension detected");
            actual
        });
        if expected == actual {
            Ok(())
        } else {
            Err(EmbeddingError::DimensionDrift { expected, actual })
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"detail": "..."}`; anything else is returned verbatim.
fn parse_api_error(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    value
        .pointer("/error/message")
        .or_else(|| value.get("error"))
        .or_else(|| value.get("detail"))
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| body.to_string(), str::to_string)
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            match self.embed_batch(batch).await {
                Ok(vectors) => {
                    self.healthy.store(true, Ordering::SeqCst);
                    out.extend(vectors);
                }
                Err(e) => {
                    if matches!(e, EmbeddingError::Http(_)) {
                        self.healthy.store(false, Ordering::SeqCst);
                    }
                    warn!(error = %e, batch = batch.len(), "embedding request failed");
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    fn is_ready(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn dimensions(&self) -> Option<usize> {
        self.dims.get().copied()
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
