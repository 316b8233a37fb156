//! Retriever configuration.

use std::time::Duration;

use botkb_index::{CorruptionPolicy, Metric};
use botkb_settings::{BotkbSettings, MetricSetting, OnCorruptSetting};

/// Runtime knobs shared by every tenant's retriever.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrieverConfig {
    /// Metric for indexes built from scratch.
    pub metric: Metric,
    /// Corrupt snapshot handling.
    pub on_corrupt: CorruptionPolicy,
    /// Passages returned when the caller gives no count.
    pub default_top_k: usize,
    /// Upper bound on any requested count.
    pub max_top_k: usize,
    /// Deadline for each embedding call.
    pub embed_timeout: Duration,
    /// Texts per embedding call during a rebuild.
    pub batch_size: usize,
    /// Dimension for a fresh tenant when the probe fails.
    pub fallback_dimensions: usize,
    /// Text embedded to discover the model dimension.
    pub probe_text: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            metric: Metric::InnerProduct,
            on_corrupt: CorruptionPolicy::Quarantine,
            default_top_k: 5,
            max_top_k: 50,
            embed_timeout: Duration::from_secs(30),
            batch_size: 32,
            fallback_dimensions: 384,
            probe_text: "test".to_string(),
        }
    }
}

impl RetrieverConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &BotkbSettings) -> Self {
        Self {
            metric: match settings.index.metric {
                MetricSetting::L2 => Metric::L2,
                MetricSetting::InnerProduct => Metric::InnerProduct,
            },
            on_corrupt: match settings.index.on_corrupt {
                OnCorruptSetting::Quarantine => CorruptionPolicy::Quarantine,
                OnCorruptSetting::Fail => CorruptionPolicy::Fail,
            },
            default_top_k: settings.retrieval.top_k,
            max_top_k: settings.retrieval.max_top_k,
            embed_timeout: Duration::from_millis(settings.retrieval.embed_timeout_ms),
            batch_size: settings.embedding.batch_size.max(1),
            fallback_dimensions: settings.embedding.fallback_dimensions,
            probe_text: settings.embedding.probe_text.clone(),
        }
    }

    /// Clamp a requested result count to `[1, max_top_k]`.
    pub fn clamp_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k.max(1))
    }
}
