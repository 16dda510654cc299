//! Cross-encoder reranking of a fused shortlist.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use rag_core::{CrossEncoder, Document, RagError, RankedList, Result};

/// Reorders a shortlist by joint (query, document) relevance.
pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>) -> Self {
        Self { encoder }
    }

    /// Score every document against `query` and keep the best `top_n`.
    ///
    /// Documents come back unchanged; equal scores keep their input order.
    /// A list shorter than `top_n` is returned whole, reordered.
    pub async fn rerank(&self, docs: RankedList, query: &str, top_n: usize) -> Result<RankedList> {
        if top_n == 0 {
            return Err(RagError::invalid_argument("rerank top_n must be positive"));
        }
        if docs.is_empty() {
            return Ok(docs);
        }

        let scores = self.encoder.score(query, &docs).await?;
        if scores.len() != docs.len() {
            return Err(RagError::rerank(format!(
                "cross-encoder returned {} scores for {} documents",
                scores.len(),
                docs.len()
            )));
        }

        let mut scored: Vec<(Document, f32)> = docs.into_iter().zip(scores).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);

        debug!(
            "Reranked to {} documents (best score {:.4})",
            scored.len(),
            scored.first().map(|s| s.1).unwrap_or_default()
        );

        Ok(scored.into_iter().map(|(doc, _)| doc).collect())
    }
}

/// Offline cross-encoder stand-in: fraction of query terms present in the passage.
///
/// Useful when no reranking model is deployed; it rewards passages that
/// mention the literal query vocabulary, which dense retrieval over a
/// hypothetical document can drift away from.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlapEncoder;

impl TermOverlapEncoder {
    fn terms(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 1)
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn overlap(query_terms: &HashSet<String>, content: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let doc_terms = Self::terms(content);
        let hits = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl CrossEncoder for TermOverlapEncoder {
    async fn score(&self, query: &str, docs: &[Document]) -> Result<Vec<f32>> {
        let query_terms = Self::terms(query);
        Ok(docs
            .iter()
            .map(|d| Self::overlap(&query_terms, &d.content))
            .collect())
    }
}
