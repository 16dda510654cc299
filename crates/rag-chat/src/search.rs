//! Web search evidence path.

use std::sync::Arc;

use tracing::debug;

use rag_core::{RagError, Result, WebSearch};

/// Separator between context passages.
pub(crate) const PASSAGE_SEPARATOR: &str = "\n\n";

/// Turns external search results into a context block.
pub struct WebSearchPath {
    search: Arc<dyn WebSearch>,
    max_results: usize,
}

impl WebSearchPath {
    pub fn new(search: Arc<dyn WebSearch>, max_results: usize) -> Self {
        Self {
            search,
            max_results: max_results.max(1),
        }
    }

    /// Search for `query` and join the non-empty result contents.
    pub async fn gather(&self, query: &str) -> Result<String> {
        let hits = self
            .search
            .search(query, self.max_results)
            .await
            .map_err(|e| match e {
                RagError::SearchFailed { .. } => e,
                other => RagError::search(other.to_string()),
            })?;

        let contents: Vec<&str> = hits
            .iter()
            .take(self.max_results)
            .map(|hit| hit.content())
            .filter(|content| !content.trim().is_empty())
            .collect();

        debug!("Web search returned {} usable results", contents.len());

        Ok(contents.join(PASSAGE_SEPARATOR))
    }
}
