//! The embedding port and a deterministic in-process backend.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::{EmbeddingError, Result};
use crate::normalize::l2_normalize;

/// Turns text into vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order, and every vector from one service must share the same length.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed `texts`, preserving order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed one text through [`embed`](Self::embed).
    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed(&[text.to_owned()]).await?;
        batch
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("backend returned no vector".into()))
    }

    /// Whether calls are expected to succeed right now.
    fn is_ready(&self) -> bool;

    /// Output dimension, once known.
    fn dimensions(&self) -> Option<usize>;

    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;
}

/// Hash-derived unit vectors, for tests and offline runs.
///
/// Identical text always maps to the identical vector. Components come
/// from SHA-256 over a block counter and the text, so long vectors do not
/// repeat with the 32-byte digest period.
pub struct MockEmbeddingService {
    dims: usize,
    ready: AtomicBool,
    latency_ms: AtomicU64,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl MockEmbeddingService {
    /// A ready mock producing `dims`-long vectors.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            ready: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    /// Flip readiness. A not-ready mock fails every call with
    /// [`EmbeddingError::NotReady`].
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Delay every `embed` call by `latency` on the tokio clock, so paused
    /// time in tests skips it.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// `embed` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts successfully embedded so far.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    /// The vector this mock returns for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = Vec::with_capacity(self.dims);
        let mut block = 0_u32;
        while v.len() < self.dims {
            let digest = Sha256::new()
                .chain_update(block.to_le_bytes())
                .chain_update(text.as_bytes())
                .finalize();
            for word in digest.chunks_exact(4) {
                if v.len() == self.dims {
                    break;
                }
                let bits = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                // u32 -> [-1, 1]
                #[allow(clippy::cast_precision_loss)]
                v.push((bits as f32 / u32::MAX as f32).mul_add(2.0, -1.0));
            }
            block += 1;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.is_ready() {
            return Err(EmbeddingError::NotReady);
        }
        let _ = self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dims)
    }

    fn model_id(&self) -> &str {
        "mock-sha256"
    }
}
