//! Per-tenant retriever: embedding port + knowledge base + snapshot.
//!
//! Readers take a cheap `Arc` clone of the current [`KnowledgeBase`] and
//! search it without holding any lock, so a concurrent mutation is never
//! observed half-applied. Writers are serialized by an async mutex; each
//! one persists the next state before swapping it in, so a failed write
//! leaves both memory and disk at the previous generation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use botkb_embeddings::{EmbeddingError, EmbeddingService};
use botkb_index::snapshot::{self, Loaded, SnapshotPaths};
use botkb_index::{Entry, KnowledgeBase, MetadataRecord, Staged};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::RetrieverConfig;
use crate::errors::{RetrievalError, Result};
use crate::passage::{Document, Passage, TenantStats};
use crate::tenant::TenantKey;

/// Retrieval state for one tenant.
pub struct Retriever {
    tenant: TenantKey,
    paths: SnapshotPaths,
    service: Arc<dyn EmbeddingService>,
    config: RetrieverConfig,
    state: RwLock<Arc<KnowledgeBase>>,
    writer: tokio::sync::Mutex<()>,
}

impl Retriever {
    /// Open the tenant stored in `dir`.
    ///
    /// A persisted snapshot is loaded as-is. Otherwise the model dimension
    /// is probed by embedding `config.probe_text`; if that fails the tenant
    /// starts with `config.fallback_dimensions` and a warning is logged.
    pub async fn open(
        tenant: TenantKey,
        dir: &Path,
        service: Arc<dyn EmbeddingService>,
        config: RetrieverConfig,
    ) -> Result<Self> {
        let paths = SnapshotPaths::in_dir(dir);
        let loaded = {
            let paths = paths.clone();
            let key = tenant.as_str().to_owned();
            let policy = config.on_corrupt;
            tokio::task::spawn_blocking(move || snapshot::load(&paths, &key, policy)).await??
        };

        let kb = match loaded {
            Loaded::Warm(kb) => {
                if kb.metric() != config.metric {
                    warn!(
                        tenant = %tenant,
                        persisted = kb.metric().name(),
                        configured = config.metric.name(),
                        "snapshot metric differs from configured metric; rebuild to switch"
                    );
                }
                kb
            }
            Loaded::Fresh | Loaded::Recovered { .. } => {
                let dims = probe_dimensions(service.as_ref(), &config, &tenant).await;
                info!(tenant = %tenant, dims, metric = config.metric.name(), "fresh tenant");
                KnowledgeBase::new(tenant.as_str(), dims, config.metric)?
            }
        };

        Ok(Self {
            tenant,
            paths,
            service,
            config,
            state: RwLock::new(Arc::new(kb)),
            writer: tokio::sync::Mutex::new(()),
        })
    }

    /// Tenant this retriever serves.
    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }

    /// Current state. Cheap; the returned value never changes.
    pub fn current(&self) -> Arc<KnowledgeBase> {
        Arc::clone(&self.state.read())
    }

    /// Index statistics.
    pub fn stats(&self) -> TenantStats {
        let kb = self.current();
        TenantStats {
            tenant: self.tenant.to_string(),
            dimensions: kb.dims(),
            metric: kb.metric(),
            count: kb.len(),
            generation: kb.generation(),
        }
    }

    /// The `top_k` passages closest to `query`, best first.
    ///
    /// `top_k` is clamped to `[1, max_top_k]` (default when `None`). A blank
    /// query or an empty index returns no passages without calling the
    /// embedding backend.
    pub async fn get_relevant(&self, query: &str, top_k: Option<usize>) -> Result<Vec<Passage>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let kb = self.current();
        if kb.is_empty() {
            debug!(tenant = %self.tenant, "empty index, no passages");
            return Ok(Vec::new());
        }

        let k = self.config.clamp_top_k(top_k);
        let vector = self.embed_one(query).await?;
        let passages = kb
            .search(&vector, k)?
            .into_iter()
            .map(|hit| Passage {
                source: hit.record.source.clone(),
                text: hit.record.text.clone(),
                score: hit.score,
            })
            .collect::<Vec<_>>();
        debug!(tenant = %self.tenant, k, returned = passages.len(), "retrieved passages");
        Ok(passages)
    }

    /// Embed and append one document, returning its id.
    pub async fn add_document(&self, document: Document) -> Result<usize> {
        let ids = self.add_documents(vec![document]).await?;
        Ok(ids.start)
    }

    /// Embed and append documents in order. Existing documents are not
    /// re-embedded. Blank documents reject the whole call.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<std::ops::Range<usize>> {
        if documents.iter().any(Document::is_blank) {
            return Err(RetrievalError::EmptyDocument);
        }
        let _writer = self.writer.lock().await;
        let current = self.current();
        if documents.is_empty() {
            return Ok(current.len()..current.len());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embed_batched(&texts).await?;

        let base = self.adapt_empty(current, &vectors)?;
        let first = base.len();
        let entries = documents
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (doc, vector))| Entry {
                record: MetadataRecord::new(doc.source_for(first + i), doc.text, self.tenant.as_str()),
                vector,
            })
            .collect();
        let staged = base.stage(entries)?;
        let staged = self.persist_staged(Arc::clone(&base), staged).await?;

        let ids = self.publish(base, staged)?;
        info!(
            tenant = %self.tenant,
            added = ids.len(),
            count = ids.end,
            "documents added"
        );
        Ok(ids)
    }

    /// Re-embed `documents` into a brand-new index that replaces the current
    /// one. Blank documents are skipped. Returns the new document count.
    pub async fn rebuild(&self, documents: Vec<Document>) -> Result<usize> {
        let _writer = self.writer.lock().await;
        let current = self.current();

        let (documents, blank): (Vec<_>, Vec<_>) =
            documents.into_iter().partition(|d| !d.is_blank());
        if !blank.is_empty() {
            warn!(tenant = %self.tenant, skipped = blank.len(), "skipping blank documents in rebuild");
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embed_batched(&texts).await?;
        let dims = vectors.first().map_or(current.dims(), Vec::len);

        let entries = documents
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (doc, vector))| Entry {
                record: MetadataRecord::new(doc.source_for(i), doc.text, self.tenant.as_str()),
                vector,
            })
            .collect();
        let next = Arc::new(KnowledgeBase::with_entries(
            self.tenant.as_str(),
            dims,
            self.config.metric,
            entries,
            current.generation() + 1,
        )?);

        let paths = self.paths.clone();
        let to_save = Arc::clone(&next);
        tokio::task::spawn_blocking(move || snapshot::save(&paths, &to_save)).await??;

        let count = next.len();
        *self.state.write() = next;
        info!(tenant = %self.tenant, count, dims, "index rebuilt");
        Ok(count)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// An empty tenant adopts the dimension the model actually produces,
    /// which matters when the startup probe fell back to the default.
    fn adapt_empty(
        &self,
        current: Arc<KnowledgeBase>,
        vectors: &[Vec<f32>],
    ) -> Result<Arc<KnowledgeBase>> {
        let Some(observed) = vectors.first().map(Vec::len) else {
            return Ok(current);
        };
        if !current.is_empty() || observed == current.dims() || observed == 0 {
            return Ok(current);
        }
        info!(
            tenant = %self.tenant,
            from = current.dims(),
            to = observed,
            "empty index adopting model dimension"
        );
        Ok(Arc::new(KnowledgeBase::with_entries(
            self.tenant.as_str(),
            observed,
            current.metric(),
            Vec::new(),
            current.generation(),
        )?))
    }

    /// Commit `staged` onto `base` and make the result current.
    ///
    /// Nothing becomes visible unless the commit succeeds. When `base` is
    /// the published state it is extended in place.
    fn publish(&self, base: Arc<KnowledgeBase>, staged: Staged) -> Result<std::ops::Range<usize>> {
        let mut state = self.state.write();
        let committed = if Arc::ptr_eq(&*state, &base) {
            drop(base);
            // make_mut may clone, so reject a stale stage before touching state.
            state
                .check_stage(&staged)
                .and_then(|()| Arc::make_mut(&mut *state).commit(staged))
        } else {
            let mut next = base;
            let committed = Arc::make_mut(&mut next).commit(staged);
            if committed.is_ok() {
                *state = next;
            }
            committed
        };
        committed.map_err(|e| {
            error!(tenant = %self.tenant, error = %e, "commit failed after snapshot write");
            e.into()
        })
    }

    async fn persist_staged(&self, base: Arc<KnowledgeBase>, staged: Staged) -> Result<Staged> {
        let paths = self.paths.clone();
        let staged = tokio::task::spawn_blocking(move || {
            snapshot::save_staged(&paths, &base, &staged).map(|()| staged)
        })
        .await??;
        Ok(staged)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = embed_with_timeout(
            self.service.as_ref(),
            self.config.embed_timeout,
            &[text.to_string()],
        )
        .await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("empty result".into()).into())
    }

    async fn embed_batched(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let vectors =
                embed_with_timeout(self.service.as_ref(), self.config.embed_timeout, chunk).await?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("tenant", &self.tenant)
            .field("paths", &self.paths)
            .field("model", &self.service.model_id())
            .finish_non_exhaustive()
    }
}

async fn embed_with_timeout(
    service: &dyn EmbeddingService,
    timeout: Duration,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let Ok(result) = tokio::time::timeout(timeout, service.embed(texts)).await else {
        return Err(RetrievalError::Timeout {
            ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        });
    };
    let vectors = result?;
    if vectors.len() != texts.len() {
        return Err(EmbeddingError::Inference(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            vectors.len()
        ))
        .into());
    }
    Ok(vectors)
}

async fn probe_dimensions(
    service: &dyn EmbeddingService,
    config: &RetrieverConfig,
    tenant: &TenantKey,
) -> usize {
    let probe = [config.probe_text.clone()];
    match embed_with_timeout(service, config.embed_timeout, &probe).await {
        Ok(v) if v.first().is_some_and(|v| !v.is_empty()) => v[0].len(),
        Ok(_) => {
            warn!(
                tenant = %tenant,
                fallback = config.fallback_dimensions,
                "dimension probe returned no vector, using fallback"
            );
            config.fallback_dimensions
        }
        Err(e) => {
            warn!(
                tenant = %tenant,
                error = %e,
                fallback = config.fallback_dimensions,
                "dimension probe failed, using fallback"
            );
            config.fallback_dimensions
        }
    }
}
