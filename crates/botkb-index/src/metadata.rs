//! Metadata store: per-document records aligned with index ids.
//!
//! Record `i` describes the vector with index id `i`. Mutation is
//! crate-private; outside callers go through [`crate::KnowledgeBase`], which
//! keeps both sides the same length.

use serde::{Deserialize, Serialize};

use crate::errors::{IndexError, Result};

/// What a retrieved passage is made of.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Human-readable label (e.g. `doc_3` or a file name).
    pub source: String,
    /// Raw document text.
    pub text: String,
    /// Owning tenant key.
    pub tenant: String,
}

impl MetadataRecord {
    /// Build a record.
    pub fn new(
        source: impl Into<String>,
        text: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            tenant: tenant.into(),
        }
    }
}

/// Ordered record sequence, indexed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records already in id order.
    pub fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    /// Look up the record for `id`.
    pub fn get(&self, id: usize) -> Result<&MetadataRecord> {
        self.records.get(id).ok_or(IndexError::NotFound {
            id,
            len: self.records.len(),
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, MetadataRecord> {
        self.records.iter()
    }

    /// Records as a slice.
    pub fn as_slice(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub(crate) fn append(&mut self, records: impl IntoIterator<Item = MetadataRecord>) {
        self.records.extend(records);
    }

    #[cfg(test)]
    pub(crate) fn replace_all(&mut self, records: Vec<MetadataRecord>) {
        self.records = records;
    }
}

impl<'a> IntoIterator for &'a MetadataStore {
    type Item = &'a MetadataRecord;
    type IntoIter = std::slice::Iter<'a, MetadataRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
