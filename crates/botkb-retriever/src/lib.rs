//! # botkb-retriever
//!
//! Per-tenant retrieval: turn a question into ranked passages, and documents
//! into indexed entries.
//!
//! - [`Retriever`]: one tenant's knowledge base, snapshot and embedding
//!   calls. Single writer, lock-free readers.
//! - [`TenantRegistry`]: lazily opens one retriever per tenant key and maps
//!   keys to directories under a data root.
//! - [`ContextOutcome`]: what the answering layer receives; keeps "nothing
//!   relevant" apart from "backend unavailable".
//!
//! ## Crate Position
//!
//! Depends on: botkb-embeddings, botkb-index, botkb-settings.
//! Depended on by: botkb-cli.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod passage;
pub mod registry;
pub mod retriever;
pub mod tenant;

pub use config::RetrieverConfig;
pub use errors::{RetrievalError, Result};
pub use passage::{ContextOutcome, Document, Passage, TenantStats};
pub use registry::TenantRegistry;
pub use retriever::Retriever;
pub use tenant::TenantKey;
