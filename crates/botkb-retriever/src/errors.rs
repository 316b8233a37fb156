//! Retrieval error types.

use botkb_embeddings::EmbeddingError;
use botkb_index::IndexError;
use thiserror::Error;

/// Errors from retriever and registry operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding backend failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The index, metadata store or snapshot rejected the operation.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// An embedding call exceeded its deadline.
    #[error("embedding timed out after {ms}ms")]
    Timeout {
        /// The deadline that elapsed.
        ms: u64,
    },

    /// A document with no text was submitted.
    #[error("document text is empty")]
    EmptyDocument,

    /// The tenant key cannot be used.
    #[error("invalid tenant key: {0}")]
    InvalidTenant(String),

    /// A blocking persistence task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for RetrievalError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}

/// Result alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
