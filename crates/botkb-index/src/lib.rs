//! # botkb-index
//!
//! In-memory vector retrieval state for one tenant, and its on-disk form.
//!
//! - [`FlatIndex`]: exact brute-force k-NN over dense `f32` vectors with a
//!   fixed dimension and metric (squared L2 or inner product).
//! - [`MetadataStore`]: records positionally aligned with index ids.
//! - [`KnowledgeBase`]: the two above as one unit. Vectors and records can
//!   only enter together, through a staged append, so
//!   `index.len() == metadata.len()` holds after every operation.
//! - [`snapshot`]: two-file persistence (`vectors.idx` + `metadata.json`)
//!   with temp-file-and-rename writes and a generation stamp shared by both
//!   halves.
//!
//! ## Crate Position
//!
//! Standalone (no botkb crate dependencies).
//! Depended on by: botkb-retriever.

#![deny(unsafe_code)]

pub mod errors;
pub mod flat;
pub mod knowledge;
pub mod metadata;
pub mod metric;
pub mod snapshot;

pub use errors::{IndexError, Result};
pub use flat::{FlatIndex, Neighbor};
pub use knowledge::{Entry, Hit, KnowledgeBase, Staged};
pub use metadata::{MetadataRecord, MetadataStore};
pub use metric::{Metric, dot, squared_l2};
pub use snapshot::{CorruptionPolicy, Loaded, SnapshotPaths};
