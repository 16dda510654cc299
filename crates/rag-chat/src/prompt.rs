//! Answer prompt templates.
//!
//! Every evidence path shares one shape: system instruction, optional
//! context block, prior history, then the new question.

use rag_core::{Classification, ConversationTurn, Prompt, PromptRole};

pub const RAG_INSTRUCTION: &str =
    "You are a helpful assistant. Use the following context to answer the question.";

pub const SEARCH_INSTRUCTION: &str =
    "You are a search assistant. Use the search results to answer the question.";

pub const CHAT_INSTRUCTION: &str = "You are a friendly chatbot.";

/// The system instruction for an evidence path.
pub fn system_instruction(path: Classification) -> &'static str {
    match path {
        Classification::Retrieve => RAG_INSTRUCTION,
        Classification::Search => SEARCH_INSTRUCTION,
        Classification::Chitchat => CHAT_INSTRUCTION,
    }
}

/// Assemble the single prompt sent to the model for an answer.
///
/// A blank `context` is left out rather than sent as an empty message.
pub fn answer_prompt(
    path: Classification,
    context: Option<&str>,
    history: &[ConversationTurn],
    question: &str,
) -> Prompt {
    let mut prompt = Prompt::default();
    prompt.push(PromptRole::System, system_instruction(path));

    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push(PromptRole::System, context);
    }

    for turn in history {
        prompt.push(turn.role.into(), turn.content.as_str());
    }

    prompt.push(PromptRole::Human, question);
    prompt
}
