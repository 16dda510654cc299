//! Conversational answering over one evidence path.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rag_core::{
    ChatModel, Classification, ConversationTurn, HistoryStore, RagError, Result, SessionId,
};
use rag_query::RetrievalOrchestrator;

use crate::prompt::answer_prompt;
use crate::search::{WebSearchPath, PASSAGE_SEPARATOR};

/// A question asked within a session.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub session: SessionId,

    /// Index partition searched on the retrieve path.
    pub tenant: String,

    pub question: String,
}

impl ChatRequest {
    /// A request whose tenant is the session's user.
    pub fn new(session: SessionId, question: impl Into<String>) -> Self {
        Self {
            tenant: session.user_id().to_string(),
            session,
            question: question.into(),
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }
}

/// Answers a question with history, optionally grounded in evidence.
///
/// History is read before the completion and the human/ai pair is
/// appended only after it succeeds, so a failed request leaves the
/// session untouched.
pub struct ConversationalChain {
    model: Arc<dyn ChatModel>,
    history: Arc<dyn HistoryStore>,
    retrieval: Arc<RetrievalOrchestrator>,
    web: Option<WebSearchPath>,
}

impl ConversationalChain {
    pub fn new(
        model: Arc<dyn ChatModel>,
        history: Arc<dyn HistoryStore>,
        retrieval: Arc<RetrievalOrchestrator>,
    ) -> Self {
        Self {
            model,
            history,
            retrieval,
            web: None,
        }
    }

    /// Enable the search path.
    pub fn with_web_search(mut self, web: WebSearchPath) -> Self {
        self.web = Some(web);
        self
    }

    /// Answer `request` using the evidence path `path`.
    pub async fn respond(&self, request: &ChatRequest, path: Classification) -> Result<String> {
        let (path, context) = self.gather_context(request, path).await?;

        let history = self.history.load_history(&request.session).await?;
        let prompt = answer_prompt(path, context.as_deref(), &history, &request.question);

        debug!(
            session = %request.session,
            path = %path,
            history_turns = history.len(),
            "Prompt assembled with {} messages",
            prompt.messages.len()
        );

        let answer = self.model.complete(&prompt).await.map_err(|e| match e {
            RagError::CompletionFailed { .. } => e,
            other => RagError::completion(other.to_string()),
        })?;

        self.history
            .append_history(
                &request.session,
                &[
                    ConversationTurn::human(request.question.as_str()),
                    ConversationTurn::ai(answer.as_str()),
                ],
            )
            .await?;

        info!(session = %request.session, path = %path, "Answered question");

        Ok(answer)
    }

    /// Evidence for `path`, and the path actually taken.
    async fn gather_context(
        &self,
        request: &ChatRequest,
        path: Classification,
    ) -> Result<(Classification, Option<String>)> {
        match path {
            Classification::Retrieve => {
                let docs = self
                    .retrieval
                    .retrieve(&request.question, &request.tenant)
                    .await?;
                let context = docs
                    .iter()
                    .map(|d| d.content.as_str())
                    .collect::<Vec<_>>()
                    .join(PASSAGE_SEPARATOR);
                Ok((path, Some(context)))
            }
            Classification::Search => match &self.web {
                Some(web) => Ok((path, Some(web.gather(&request.question).await?))),
                None => {
                    warn!("No web search configured, answering as chitchat");
                    Ok((Classification::Chitchat, None))
                }
            },
            Classification::Chitchat => Ok((path, None)),
        }
    }
}
