//! A tenant's index and metadata store as one unit.
//!
//! Vectors and records enter together through [`KnowledgeBase::stage`] and
//! [`KnowledgeBase::commit`]. Staging validates without mutating; commit
//! applies both halves in one step. Callers that persist before committing
//! (the retriever does) stage, write the snapshot, then commit, so a failed
//! write never changes in-memory state.

use std::ops::Range;

use tracing::warn;

use crate::errors::{IndexError, Result};
use crate::flat::FlatIndex;
use crate::metadata::{MetadataRecord, MetadataStore};
use crate::metric::Metric;

/// One document ready to be indexed.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Embedding of `record.text`.
    pub vector: Vec<f32>,
    /// Record stored under the same id.
    pub record: MetadataRecord,
}

/// A validated append that has not been applied yet.
#[derive(Clone, Debug)]
pub struct Staged {
    base_len: usize,
    base_generation: u64,
    vectors: Vec<Vec<f32>>,
    records: Vec<MetadataRecord>,
}

impl Staged {
    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Generation the knowledge base will carry once this is committed.
    pub fn generation(&self) -> u64 {
        self.base_generation + 1
    }

    /// Ids the entries will receive.
    pub fn ids(&self) -> Range<usize> {
        self.base_len..self.base_len + self.vectors.len()
    }

    /// Staged vectors in id order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.iter().map(Vec::as_slice)
    }

    /// Staged records in id order.
    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }
}

/// A search result resolved to its record.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit<'a> {
    /// Index id.
    pub id: usize,
    /// Score under the index metric.
    pub score: f32,
    /// Record stored under `id`.
    pub record: &'a MetadataRecord,
}

/// Index plus aligned metadata for one tenant.
///
/// `index.len() == metadata.len()` after every public operation.
/// `generation` counts successful mutations and is stamped into both
/// snapshot files.
#[derive(Clone, Debug)]
pub struct KnowledgeBase {
    tenant: String,
    index: FlatIndex,
    metadata: MetadataStore,
    generation: u64,
}

impl KnowledgeBase {
    /// An empty knowledge base at generation 0.
    pub fn new(tenant: impl Into<String>, dims: usize, metric: Metric) -> Result<Self> {
        Ok(Self {
            tenant: tenant.into(),
            index: FlatIndex::new(dims, metric)?,
            metadata: MetadataStore::new(),
            generation: 0,
        })
    }

    /// Reassemble a knowledge base from persisted halves.
    pub fn from_parts(
        tenant: impl Into<String>,
        index: FlatIndex,
        metadata: MetadataStore,
        generation: u64,
    ) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(IndexError::CountMismatch {
                vectors: index.len(),
                records: metadata.len(),
            });
        }
        let tenant = tenant.into();
        if let Some(stray) = metadata.iter().find(|r| r.tenant != tenant) {
            return Err(IndexError::TenantMismatch {
                expected: tenant,
                actual: stray.tenant.clone(),
            });
        }
        Ok(Self {
            tenant,
            index,
            metadata,
            generation,
        })
    }

    /// Build a fresh knowledge base holding exactly `entries`.
    ///
    /// Used for rebuilds: the result replaces the current one wholesale and
    /// carries `generation`.
    pub fn with_entries(
        tenant: impl Into<String>,
        dims: usize,
        metric: Metric,
        entries: Vec<Entry>,
        generation: u64,
    ) -> Result<Self> {
        let mut kb = Self::new(tenant, dims, metric)?;
        let staged = kb.stage(entries)?;
        let _ = kb.commit(staged)?;
        kb.generation = generation;
        Ok(kb)
    }

    /// Owning tenant key.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Vector dimension.
    pub fn dims(&self) -> usize {
        self.index.dims()
    }

    /// Ranking metric.
    pub fn metric(&self) -> Metric {
        self.index.metric()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no document has been indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Mutation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The vector index.
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// The metadata store.
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Validate `entries` for appending. Does not modify `self`.
    pub fn stage(&self, entries: Vec<Entry>) -> Result<Staged> {
        let mut vectors = Vec::with_capacity(entries.len());
        let mut records = Vec::with_capacity(entries.len());
        for Entry { vector, record } in entries {
            if record.tenant != self.tenant {
                return Err(IndexError::TenantMismatch {
                    expected: self.tenant.clone(),
                    actual: record.tenant,
                });
            }
            vectors.push(vector);
            records.push(record);
        }
        self.index.check(&vectors)?;
        Ok(Staged {
            base_len: self.len(),
            base_generation: self.generation,
            vectors,
            records,
        })
    }

    /// Whether `staged` was built on this exact state.
    pub fn check_stage(&self, staged: &Staged) -> Result<()> {
        if staged.base_len != self.len() || staged.base_generation != self.generation {
            return Err(IndexError::StaleStage {
                staged_on: staged.base_len,
                current: self.len(),
            });
        }
        Ok(())
    }

    /// Apply a staged append.
    ///
    /// Fails with `StaleStage` if anything was committed since `staged` was
    /// built; nothing is modified in that case.
    pub fn commit(&mut self, staged: Staged) -> Result<Range<usize>> {
        self.check_stage(&staged)?;
        let generation = staged.generation();
        let ids = self.index.add(&staged.vectors)?;
        self.metadata.append(staged.records);
        self.generation = generation;
        Ok(ids)
    }

    /// Stage and commit in one call.
    pub fn append(&mut self, entries: Vec<Entry>) -> Result<Range<usize>> {
        let staged = self.stage(entries)?;
        self.commit(staged)
    }

    /// Top-`k` hits for `query`, closest first.
    ///
    /// Ids without a record are dropped with a warning.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit<'_>>> {
        let neighbors = self.index.search(query, k)?;
        let mut hits = Vec::with_capacity(neighbors.len());
        for n in neighbors {
            match self.metadata.get(n.id) {
                Ok(record) => hits.push(Hit {
                    id: n.id,
                    score: n.score,
                    record,
                }),
                Err(e) => {
                    warn!(tenant = %self.tenant, id = n.id, error = %e, "dropping search hit without metadata");
                }
            }
        }
        Ok(hits)
    }
}
