//! Interfaces of the external collaborators the pipeline depends on.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConversationTurn, Document, Prompt, RankedList, SearchHit, SessionId};

/// Embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a text. Must be deterministic for identical text and model.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Tenant-partitioned nearest-neighbour search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` documents of `tenant` closest to `embedding`, best first.
    ///
    /// Fails with [`RagError::EmptyTenantIndex`](crate::RagError::EmptyTenantIndex)
    /// when the tenant has nothing indexed.
    async fn vector_search(&self, embedding: &[f32], k: usize, tenant: &str) -> Result<RankedList>;
}

/// Tenant-partitioned lexical (BM25-style) search.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    /// Same error contract as [`VectorIndex::vector_search`].
    async fn lexical_search(&self, query: &str, tenant: &str) -> Result<RankedList>;
}

/// Joint (query, document) relevance scorer.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// One score per document, in input order. Higher is more relevant.
    async fn score(&self, query: &str, docs: &[Document]) -> Result<Vec<f32>>;
}

/// Single-shot chat completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Per-session conversation history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All turns of the session, oldest first. Unknown sessions are empty.
    async fn load_history(&self, session: &SessionId) -> Result<Vec<ConversationTurn>>;

    /// Append `turns` in order; either all of them are stored or none.
    async fn append_history(&self, session: &SessionId, turns: &[ConversationTurn]) -> Result<()>;
}

/// External web search tool.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}
