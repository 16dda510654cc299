//! Routing plus answering, the entry point for a chat turn.

use serde::Serialize;
use tracing::info;

use rag_core::{Classification, Result};

use crate::chain::{ChatRequest, ConversationalChain};
use crate::router::QueryRouter;

/// Number of question characters kept in a conversation preview.
pub const PREVIEW_CHARS: usize = 100;

/// The outcome of one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub classification: Classification,
    pub question: String,
}

impl ChatResponse {
    /// Short summary of the question for a conversation list.
    pub fn preview(&self) -> String {
        let mut chars = self.question.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// Classifies a question, then answers it along the chosen path.
pub struct ChatPipeline {
    router: QueryRouter,
    chain: ConversationalChain,
}

impl ChatPipeline {
    pub fn new(router: QueryRouter, chain: ConversationalChain) -> Self {
        Self { router, chain }
    }

    pub async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let classification = self.router.classify(&request.question).await;
        info!(session = %request.session, "Routing question to {}", classification);

        let answer = self.chain.respond(request, classification).await?;

        Ok(ChatResponse {
            answer,
            classification,
            question: request.question.clone(),
        })
    }
}
