//! Tenant partition checks shared by the retrievers.

use tracing::warn;

use rag_core::{RagError, RankedList, Result};

/// Reject blank tenant names before they reach an index.
pub(crate) fn check_tenant(tenant: &str) -> Result<()> {
    if tenant.trim().is_empty() {
        return Err(RagError::invalid_argument("tenant must not be empty"));
    }
    Ok(())
}

/// Drop documents an index returned for a different tenant.
///
/// Documents without a `tenant` metadata entry are kept: the index is the
/// partition, the metadata is only a second line of defence.
pub(crate) fn retain_tenant(mut docs: RankedList, tenant: &str, stage: &str) -> RankedList {
    let before = docs.len();
    docs.retain(|d| d.tenant().map_or(true, |t| t == tenant));

    let dropped = before - docs.len();
    if dropped > 0 {
        warn!(
            stage,
            tenant, dropped, "Index returned documents belonging to another tenant"
        );
    }
    docs
}
