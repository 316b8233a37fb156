//! Embedding error types.
//!
//! Every variant is a hard failure of the operation that needed the
//! embedding. Whether that degrades to "answer without context" is decided
//! by the caller, not here.

use thiserror::Error;

/// Errors from embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Service not ready (backend unreachable or disabled).
    #[error("Embedding service not ready")]
    NotReady,

    /// The backend answered but produced no usable vectors.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Transport-level failure (preserves source chain).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned a non-success status.
    #[error("Embedding API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or extracted error message.
        message: String,
    },

    /// The backend changed its output dimension after the first call.
    #[error("dimension drift: expected {expected}, got {actual}")]
    DimensionDrift {
        /// Dimension frozen on the first call.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let cases = vec![
            (EmbeddingError::NotReady, "Embedding service not ready"),
            (
                EmbeddingError::Inference("empty result".into()),
                "Inference failed: empty result",
            ),
            (
                EmbeddingError::Api {
                    status: 503,
                    message: "overloaded".into(),
                },
                "Embedding API error (status 503): overloaded",
            ),
            (
                EmbeddingError::DimensionDrift {
                    expected: 384,
                    actual: 768,
                },
                "dimension drift: expected 384, got 768",
            ),
            (
                EmbeddingError::Config("missing key".into()),
                "Config error: missing key",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EmbeddingError>();
    }
}
