//! # botkb-embeddings
//!
//! The embedding port: text in, fixed-length `f32` vectors out.
//!
//! - [`EmbeddingService`] is the seam every retriever depends on.
//! - [`HttpEmbeddingService`] talks to any `OpenAI`-compatible
//!   `POST /embeddings` endpoint and freezes the output dimension on its
//!   first successful call.
//! - [`MockEmbeddingService`] produces deterministic SHA-256-seeded vectors
//!   for tests.
//!
//! ## Crate Position
//!
//! Depends on: botkb-settings.
//! Depended on by: botkb-retriever, botkb-cli.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod http;
pub mod normalize;
pub mod service;

pub use config::EmbeddingConfig;
pub use errors::{EmbeddingError, Result};
pub use http::HttpEmbeddingService;
pub use normalize::{l2_norm, l2_normalize};
pub use service::{EmbeddingService, MockEmbeddingService};
