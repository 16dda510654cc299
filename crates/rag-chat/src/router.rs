//! Question classification.

use std::sync::Arc;

use tracing::{debug, warn};

use rag_core::{ChatModel, Classification, Prompt};

/// Builds the classification instruction for `question`.
pub fn classification_prompt(question: &str) -> Prompt {
    Prompt::text(format!(
        "You are a classifier that routes user questions into one of the following categories:\n\
         - retrieve: the question requires knowledge from documents.\n\
         - search: the question needs real-time or external information.\n\
         - chitchat: the question is casual or small talk.\n\
         \n\
         Return only one word: retrieve, search, or chitchat.\n\
         Question: {question}"
    ))
}

/// One-shot router from a question to an evidence path.
///
/// Stateless: nothing about earlier questions is remembered.
pub struct QueryRouter {
    model: Arc<dyn ChatModel>,
}

impl QueryRouter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify `question`. Never fails.
    ///
    /// Unrecognised labels and failed completions both resolve to
    /// [`Classification::Chitchat`], the path that needs no evidence.
    pub async fn classify(&self, question: &str) -> Classification {
        let raw = match self.model.complete(&classification_prompt(question)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Classification call failed, answering as chitchat");
                return Classification::Chitchat;
            }
        };

        let classification = Classification::from_label(&raw);
        if classification.as_str() != raw.trim().to_lowercase() {
            warn!(label = %raw.trim(), "Unrecognised classification label, answering as chitchat");
        }

        debug!("Classified question as {}", classification);
        classification
    }
}
