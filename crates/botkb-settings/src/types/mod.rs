//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON wire
//! format. Each type implements [`Default`] with production values and is
//! marked `#[serde(default)]`, so partial JSON is accepted and missing
//! fields keep their default during deserialization.

mod embedding;
mod index;

pub use embedding::*;
pub use index::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for botkb.
///
/// Loaded from `~/.botkb/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "embedding": { "baseUrl": "http://localhost:8080/v1" },
///   "index": { "metric": "l2" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotkbSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Embedding backend settings.
    pub embedding: EmbeddingSettings,
    /// Vector index and snapshot settings.
    pub index: IndexSettings,
    /// Passage count and embedding deadline used at query time.
    pub retrieval: RetrievalSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for BotkbSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "botkb".to_string(),
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            retrieval: RetrievalSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl BotkbSettings {
    /// Check constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: String| -> Result<()> {
            Err(SettingsError::InvalidValue { field, reason })
        };
        let r = &self.retrieval;
        if r.top_k == 0 {
            return invalid("retrieval.topK", "must be at least 1".into());
        }
        if r.top_k > r.max_top_k {
            return invalid(
                "retrieval.topK",
                format!("{} exceeds retrieval.maxTopK ({})", r.top_k, r.max_top_k),
            );
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batchSize", "must be at least 1".into());
        }
        if self.embedding.fallback_dimensions == 0 {
            return invalid("embedding.fallbackDimensions", "must be at least 1".into());
        }
        Ok(())
    }
}

/// Query-time retrieval settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Passages returned when the caller does not ask for a count.
    pub top_k: usize,
    /// Upper bound on any requested count.
    pub max_top_k: usize,
    /// Deadline for a single embedding call made by the retriever.
    pub embed_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_top_k: 50,
            embed_timeout_ms: 30_000,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of the compact human format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
