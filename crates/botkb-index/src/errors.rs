//! Index error types.
//!
//! Contract violations (`DimensionMismatch`, `CountMismatch`,
//! `TenantMismatch`, `StaleStage`) reject the operation and leave the
//! structures untouched. `NotFound` is local to a lookup. `CorruptSnapshot`
//! is only returned when the configured policy refuses to recover.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from index, metadata and snapshot operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// An index was requested with zero dimensions.
    #[error("index dimension must be non-zero")]
    ZeroDimension,

    /// A vector's length disagrees with the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The index dimension.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// Vectors and metadata records arrived in different numbers.
    #[error("count mismatch: {vectors} vectors, {records} metadata records")]
    CountMismatch {
        /// Number of vectors.
        vectors: usize,
        /// Number of records.
        records: usize,
    },

    /// Metadata lookup past the end of the store.
    #[error("metadata id {id} not found (store holds {len} records)")]
    NotFound {
        /// Requested id.
        id: usize,
        /// Current store length.
        len: usize,
    },

    /// A record was tagged with a different tenant than the store it targets.
    #[error("record belongs to tenant {actual:?}, not {expected:?}")]
    TenantMismatch {
        /// Tenant owning the store.
        expected: String,
        /// Tenant on the record.
        actual: String,
    },

    /// A staged append was committed after the base it was staged on changed.
    #[error("staged append built on {staged_on} entries, store now holds {current}")]
    StaleStage {
        /// Entry count when the append was staged.
        staged_on: usize,
        /// Entry count at commit time.
        current: usize,
    },

    /// A persisted snapshot could not be read back.
    #[error("corrupt snapshot at {}: {reason}", path.display())]
    CorruptSnapshot {
        /// The file that failed validation.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Filesystem error (preserves source chain).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
