//! rag-remote - HTTP collaborators
//!
//! - [`OpenAiChatModel`]: any OpenAI-compatible `/chat/completions` endpoint
//! - [`OpenAiEmbedder`]: the matching `/embeddings` endpoint
//! - [`TavilySearch`]: Tavily web search for the search path

mod http;
mod openai;
mod tavily;

pub use openai::{OpenAiChatModel, OpenAiEmbedder};
pub use tavily::TavilySearch;
