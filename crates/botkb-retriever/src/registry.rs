//! Tenant registry: one lazily opened [`Retriever`] per tenant key.
//!
//! Each tenant lives in its own directory under the data root, named by
//! [`TenantKey::dir_name`], so a restart finds every tenant again without a
//! separate registry file. Tenants share the embedding service and nothing
//! else.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use botkb_embeddings::EmbeddingService;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::RetrieverConfig;
use crate::errors::Result;
use crate::passage::{ContextOutcome, Document, Passage, TenantStats};
use crate::retriever::Retriever;
use crate::tenant::TenantKey;

/// Owns every tenant's retriever. Cheap to share behind an `Arc`.
pub struct TenantRegistry {
    root: PathBuf,
    service: Arc<dyn EmbeddingService>,
    config: RetrieverConfig,
    tenants: DashMap<String, Arc<OnceCell<Arc<Retriever>>>>,
}

impl TenantRegistry {
    /// Registry rooted at `root`. Nothing is read until a tenant is used.
    pub fn new(
        root: impl Into<PathBuf>,
        service: Arc<dyn EmbeddingService>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            root: root.into(),
            service,
            config,
            tenants: DashMap::new(),
        }
    }

    /// Data root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys of tenants opened so far, sorted.
    pub fn open_tenants(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tenants
            .iter()
            .filter(|e| e.value().initialized())
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// The tenant's retriever, opening it on first use.
    ///
    /// Concurrent first calls for the same key open the tenant once. A
    /// failed open is not cached; the next call retries.
    pub async fn get_or_create(&self, tenant: &str) -> Result<Arc<Retriever>> {
        let key = TenantKey::new(tenant)?;
        let cell = Arc::clone(self.tenants.entry(key.as_str().to_owned()).or_default().value());
        let retriever = cell
            .get_or_try_init(|| async {
                let dir = self.root.join(key.dir_name());
                debug!(tenant = %key, dir = %dir.display(), "opening tenant");
                Retriever::open(key.clone(), &dir, Arc::clone(&self.service), self.config.clone())
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(retriever))
    }

    /// See [`Retriever::get_relevant`].
    pub async fn get_relevant(
        &self,
        tenant: &str,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<Passage>> {
        self.get_or_create(tenant).await?.get_relevant(query, top_k).await
    }

    /// See [`Retriever::add_document`].
    pub async fn add_document(&self, tenant: &str, document: Document) -> Result<usize> {
        self.get_or_create(tenant).await?.add_document(document).await
    }

    /// See [`Retriever::rebuild`].
    pub async fn rebuild(&self, tenant: &str, documents: Vec<Document>) -> Result<usize> {
        self.get_or_create(tenant).await?.rebuild(documents).await
    }

    /// See [`Retriever::stats`].
    pub async fn stats(&self, tenant: &str) -> Result<TenantStats> {
        Ok(self.get_or_create(tenant).await?.stats())
    }

    /// Retrieval for the answering layer. Never fails: errors become
    /// [`ContextOutcome::Unavailable`] and are logged.
    pub async fn context_for(
        &self,
        tenant: &str,
        query: &str,
        top_k: Option<usize>,
    ) -> ContextOutcome {
        match self.get_relevant(tenant, query, top_k).await {
            Ok(passages) if passages.is_empty() => ContextOutcome::NoContext,
            Ok(passages) => ContextOutcome::Passages(passages),
            Err(e) => {
                warn!(tenant, error = %e, "retrieval unavailable, answering without context");
                ContextOutcome::Unavailable(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRegistry")
            .field("root", &self.root)
            .field("tenants", &self.tenants.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RetrievalError;
    use botkb_embeddings::MockEmbeddingService;
    use botkb_index::IndexError;
    use botkb_index::snapshot::{INDEX_FILE, METADATA_FILE};
    use botkb_logging::capture_logs;
    use tempfile::TempDir;
    use tracing::Level;

    fn registry(dir: &TempDir) -> (TenantRegistry, Arc<MockEmbeddingService>) {
        let service = Arc::new(MockEmbeddingService::new(8));
        let reg = TenantRegistry::new(
            dir.path(),
            Arc::clone(&service) as Arc<dyn EmbeddingService>,
            RetrieverConfig::default(),
        );
        (reg, service)
    }

    // ── get_or_create ───────────────────────────────────────────────

    #[tokio::test]
    async fn same_key_same_retriever() {
        let dir = TempDir::new().unwrap();
        let (reg, _service) = registry(&dir);
        let a = reg.get_or_create("acme").await.unwrap();
        let b = reg.get_or_create("acme").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.open_tenants(), vec!["acme".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_first_use_opens_once() {
        let dir = TempDir::new().unwrap();
        let (reg, service) = registry(&dir);
        let (a, b) = tokio::join!(reg.get_or_create("acme"), reg.get_or_create("acme"));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        // one dimension probe
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn blank_key_rejected() {
        let dir = TempDir::new().unwrap();
        let (reg, _service) = registry(&dir);
        assert!(matches!(
            reg.get_or_create("").await,
            Err(RetrievalError::InvalidTenant(_))
        ));
    }

    #[tokio::test]
    async fn tenants_get_separate_directories() {
        let dir = TempDir::new().unwrap();
        let (reg, _service) = registry(&dir);
        let _ = reg.add_document("acme", Document::new("a")).await.unwrap();
        let _ = reg.add_document("../globex", Document::new("g")).await.unwrap();

        assert!(dir.path().join("acme").join(INDEX_FILE).exists());
        assert!(dir.path().join("acme").join(METADATA_FILE).exists());
        let globex = reg.get_or_create("../globex").await.unwrap();
        let globex_dir = dir.path().join(globex.tenant().dir_name());
        assert!(globex_dir.join(INDEX_FILE).exists());
        assert!(globex_dir.starts_with(dir.path()));
    }

    #[tokio::test]
    async fn failed_open_is_retried() {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(MockEmbeddingService::new(8));
        let config = RetrieverConfig {
            on_corrupt: botkb_index::CorruptionPolicy::Fail,
            ..RetrieverConfig::default()
        };
        let reg = TenantRegistry::new(dir.path(), service, config);

        let tenant_dir = dir.path().join("acme");
        std::fs::create_dir_all(&tenant_dir).unwrap();
        std::fs::write(tenant_dir.join(INDEX_FILE), b"junk").unwrap();
        std::fs::write(tenant_dir.join(METADATA_FILE), b"{}").unwrap();

        assert!(matches!(
            reg.get_or_create("acme").await,
            Err(RetrievalError::Index(IndexError::CorruptSnapshot { .. }))
        ));
        assert!(reg.open_tenants().is_empty());

        std::fs::remove_file(tenant_dir.join(INDEX_FILE)).unwrap();
        std::fs::remove_file(tenant_dir.join(METADATA_FILE)).unwrap();
        assert!(reg.get_or_create("acme").await.is_ok());
    }

    // ── context_for ─────────────────────────────────────────────────

    #[tokio::test]
    async fn context_for_empty_tenant_is_no_context() {
        let dir = TempDir::new().unwrap();
        let (reg, _service) = registry(&dir);
        assert_eq!(
            reg.context_for("acme", "anything", None).await,
            ContextOutcome::NoContext
        );
    }

    #[tokio::test]
    async fn context_for_returns_passages() {
        let dir = TempDir::new().unwrap();
        let (reg, _service) = registry(&dir);
        let _ = reg
            .add_document("acme", Document::new("we ship worldwide"))
            .await
            .unwrap();
        match reg.context_for("acme", "we ship worldwide", Some(1)).await {
            ContextOutcome::Passages(p) => assert_eq!(p[0].text, "we ship worldwide"),
            other => panic!("expected passages, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn context_for_backend_down_is_unavailable_and_logged() {
        let (logs, _guard) = capture_logs();
        let dir = TempDir::new().unwrap();
        let (reg, service) = registry(&dir);
        let _ = reg.add_document("acme", Document::new("text")).await.unwrap();

        service.set_ready(false);
        let outcome = reg.context_for("acme", "text", None).await;
        assert!(matches!(outcome, ContextOutcome::Unavailable(_)));
        assert!(logs.has_event(Level::WARN, "retrieval unavailable"));
    }

    #[tokio::test]
    async fn stats_reports_counts() {
        let dir = TempDir::new().unwrap();
        let (reg, _service) = registry(&dir);
        let _ = reg.add_document("acme", Document::new("a")).await.unwrap();
        let _ = reg.add_document("acme", Document::new("b")).await.unwrap();
        let stats = reg.stats("acme").await.unwrap();
        assert_eq!(stats.tenant, "acme");
        assert_eq!(stats.count, 2);
        assert_eq!(stats.dimensions, 8);
        assert_eq!(stats.generation, 2);
    }
}
