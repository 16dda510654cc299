//! Hypothetical document generation (HyDE).
//!
//! A terse question embeds poorly; a fabricated passage written the way a
//! real document would phrase the answer lands much closer to the relevant
//! passages in embedding space.

use std::sync::Arc;

use tracing::debug;

use rag_core::{ChatModel, Prompt, Result};

/// Builds the instruction sent to the chat model for `query`.
pub fn hyde_prompt(query: &str) -> Prompt {
    Prompt::text(format!(
        "You are an AI assistant. Based on the following question: \"{query}\", \
         write a short passage (3-5 sentences) that reads like an excerpt from a \
         real document and contains information that could answer the question.\n\
         Do not answer the question directly. Do not hedge, do not mention that \
         the passage is simulated or hypothetical, and do not refer to yourself.\n\
         Output only the passage."
    ))
}

/// Expands a query into a plausible answer-bearing passage.
pub struct HydeGenerator {
    model: Arc<dyn ChatModel>,
}

impl HydeGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Generate the hypothetical document for `query`.
    ///
    /// Calls the model exactly once; a failed completion is returned as-is.
    pub async fn generate(&self, query: &str) -> Result<String> {
        let passage = self.model.complete(&hyde_prompt(query)).await?;
        debug!("Hypothetical document ({} chars)", passage.len());
        Ok(passage)
    }
}
