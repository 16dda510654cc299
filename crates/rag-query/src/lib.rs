//! rag-query - Hybrid retrieval engine
//!
//! This crate turns a question into the ranked evidence handed to the
//! answer prompt: a hypothetical document (HyDE) drives dense retrieval,
//! the literal question drives lexical retrieval, the two lists are merged
//! with Reciprocal Rank Fusion and the head is optionally reranked by a
//! cross-encoder.
//!
//! # Features
//!
//! - Hypothetical document generation for dense recall
//! - Concurrent dense and sparse retrieval, tenant-isolated
//! - Reciprocal Rank Fusion keyed on passage content
//! - Optional cross-encoder reranking with graceful fallback
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::RetrievalOrchestrator;
//! use std::sync::Arc;
//!
//! let orchestrator = RetrievalOrchestrator::new(model, embedder, store.clone(), store, config)
//!     .with_reranker(Arc::new(encoder));
//! let docs = orchestrator.retrieve("what is the refund window?", "alice").await?;
//! ```

mod dense;
mod fusion;
mod hyde;
mod orchestrator;
mod rerank;
mod sparse;
mod tenant;

pub use dense::DenseRetriever;
pub use fusion::{fuse, reciprocal_rank_fusion, DEFAULT_RRF_K};
pub use hyde::{hyde_prompt, HydeGenerator};
pub use orchestrator::{RerankOutcome, RetrievalOrchestrator, RetrievalReport, SourceOutcome};
pub use rerank::{Reranker, TermOverlapEncoder};
pub use sparse::SparseRetriever;

// Re-export for convenience
pub use rag_core::{Document, RankedList, ScoredResult};
