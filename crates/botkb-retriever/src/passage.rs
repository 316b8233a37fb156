//! Values crossing the retrieval boundary.

use botkb_index::Metric;
use serde::{Deserialize, Serialize};

/// One retrieved passage, ready to be placed in a prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Label of the document the text came from.
    pub source: String,
    /// Raw document text.
    pub text: String,
    /// Score under the tenant's metric (squared distance or similarity).
    pub score: f32,
}

/// A document submitted for indexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Label; `doc_<id>` is used when absent.
    pub source: Option<String>,
    /// Document text.
    pub text: String,
}

impl Document {
    /// An unlabeled document.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            source: None,
            text: text.into(),
        }
    }

    /// A document with an explicit source label.
    pub fn labeled(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            text: text.into(),
        }
    }

    /// Whether the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Label to store for the document that will receive `id`.
    pub(crate) fn source_for(&self, id: usize) -> String {
        match &self.source {
            Some(s) if !s.trim().is_empty() => s.clone(),
            _ => format!("doc_{id}"),
        }
    }
}

/// Snapshot of a tenant's index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantStats {
    /// Tenant key.
    pub tenant: String,
    /// Vector dimension.
    pub dimensions: usize,
    /// Ranking metric.
    pub metric: Metric,
    /// Number of indexed documents.
    pub count: usize,
    /// Mutation counter persisted with the snapshot.
    pub generation: u64,
}

/// What the answering layer gets back for a question.
///
/// `NoContext` and `Unavailable` both mean "answer without retrieved
/// passages"; they are kept apart so the caller can tell an empty knowledge
/// base from a broken backend.
#[derive(Clone, Debug, PartialEq)]
pub enum ContextOutcome {
    /// Ranked passages, closest first.
    Passages(Vec<Passage>),
    /// Retrieval worked but found nothing.
    NoContext,
    /// Retrieval failed; the string says why.
    Unavailable(String),
}

impl ContextOutcome {
    /// Passages, or an empty slice for the fallback variants.
    pub fn passages(&self) -> &[Passage] {
        match self {
            Self::Passages(p) => p,
            Self::NoContext | Self::Unavailable(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlabeled_document_gets_positional_label() {
        assert_eq!(Document::new("hello").source_for(4), "doc_4");
        assert_eq!(Document::labeled("  ", "hello").source_for(0), "doc_0");
        assert_eq!(
            Document::labeled("faq.txt", "hello").source_for(9),
            "faq.txt"
        );
    }

    #[test]
    fn blank_detection() {
        assert!(Document::new("").is_blank());
        assert!(Document::new(" \n\t").is_blank());
        assert!(!Document::new(" x ").is_blank());
    }

    #[test]
    fn passage_serializes_flat() {
        let p = Passage {
            source: "doc_0".into(),
            text: "refunds within 30 days".into(),
            score: 0.5,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["source"], "doc_0");
        assert_eq!(json["score"], 0.5);
    }

    #[test]
    fn fallback_outcomes_have_no_passages() {
        assert!(ContextOutcome::NoContext.passages().is_empty());
        assert!(ContextOutcome::Unavailable("down".into()).passages().is_empty());
    }
}
