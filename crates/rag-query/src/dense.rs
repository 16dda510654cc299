//! Dense (embedding similarity) retrieval.

use std::sync::Arc;

use tracing::debug;

use rag_core::{RagError, RankedList, Result, VectorIndex};

use crate::tenant::{check_tenant, retain_tenant};

/// Top-k nearest passages from the tenant's vector collection.
pub struct DenseRetriever {
    index: Arc<dyn VectorIndex>,
}

impl DenseRetriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Search the tenant's collection with `probe`.
    ///
    /// A tenant with nothing indexed yields [`RagError::EmptyTenantIndex`].
    pub async fn search(&self, probe: &[f32], k: usize, tenant: &str) -> Result<RankedList> {
        check_tenant(tenant)?;
        if k == 0 {
            return Err(RagError::invalid_argument("dense k must be positive"));
        }
        if probe.is_empty() {
            return Err(RagError::invalid_argument("probe vector is empty"));
        }

        let mut docs = self.index.vector_search(probe, k, tenant).await?;
        docs.truncate(k);

        let docs = retain_tenant(docs, tenant, "dense");
        debug!("Dense search for tenant {} returned {} documents", tenant, docs.len());
        Ok(docs)
    }
}
