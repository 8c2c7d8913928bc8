//! Aegis Memory - Embedding Service
//!
//! Maps text to fixed-width vectors via an external provider, fronted by a
//! two-tier cache (in-process LRU + persisted table) to minimize external
//! calls.

pub mod cache;
pub mod error;
pub mod provider;
pub mod service;
pub mod types;

pub use cache::{normalize_and_hash, CacheStats, EmbeddingCache};
pub use error::{EmbeddingError, EmbeddingResult};
pub use provider::{DummyEmbeddingProvider, EmbeddingProvider, HttpEmbeddingProvider};
pub use service::EmbeddingService;
pub use types::{EmbeddingConfig, EmbeddingVector};
