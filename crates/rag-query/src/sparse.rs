//! Sparse (lexical, BM25-style) retrieval.

use std::sync::Arc;

use tracing::debug;

use rag_core::{LexicalIndex, RankedList, Result};

use crate::tenant::{check_tenant, retain_tenant};

/// Keyword search against the tenant's lexical index.
pub struct SparseRetriever {
    index: Arc<dyn LexicalIndex>,
}

impl SparseRetriever {
    pub fn new(index: Arc<dyn LexicalIndex>) -> Self {
        Self { index }
    }

    /// Search the tenant's lexical index with the literal query.
    pub async fn search(&self, query: &str, tenant: &str) -> Result<RankedList> {
        check_tenant(tenant)?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let docs = self.index.lexical_search(query, tenant).await?;
        let docs = retain_tenant(docs, tenant, "sparse");
        debug!("Lexical search for tenant {} returned {} documents", tenant, docs.len());
        Ok(docs)
    }
}
