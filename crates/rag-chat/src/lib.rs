//! rag-chat - Question routing and conversational answering
//!
//! This crate sits on top of the retrieval pipeline in `rag-query`:
//! - [`QueryRouter`] decides which evidence path answers a question
//! - [`WebSearchPath`] gathers context from an external search tool
//! - [`ConversationalChain`] assembles the prompt, calls the model once and
//!   records the exchange in the session history
//! - [`ChatPipeline`] ties routing and answering together

mod chain;
mod pipeline;
mod prompt;
mod router;
mod search;

pub use chain::{ChatRequest, ConversationalChain};
pub use pipeline::{ChatPipeline, ChatResponse, PREVIEW_CHARS};
pub use prompt::{
    answer_prompt, system_instruction, CHAT_INSTRUCTION, RAG_INSTRUCTION, SEARCH_INSTRUCTION,
};
pub use router::{classification_prompt, QueryRouter};
pub use search::WebSearchPath;

// Re-export types for convenience
pub use rag_core::{Classification, ConversationTurn, SessionId};
