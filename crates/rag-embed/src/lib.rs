//! rag-embed - Offline embedding model
//!
//! This crate provides [`HashEmbedder`], a deterministic feature-hashing
//! embedder used when no embedding service is configured and throughout
//! the test suites.

mod hash;

pub use hash::HashEmbedder;

// Re-export the Embedder trait for convenience
pub use rag_core::Embedder;
