//! OpenAI-compatible chat completions and embeddings.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use rag_core::{
    ChatModel, CompletionConfig, Embedder, EmbeddingConfig, Prompt, PromptRole, RagError, Result,
};

use crate::http;

/// Chat model behind an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    /// Reads the API key from the environment variable named in `config`.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = http::api_key(&config.api_key_env, &config.base_url)?;
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &CompletionConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        let messages: Vec<Value> = prompt
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    PromptRole::System => "system",
                    PromptRole::Human => "user",
                    PromptRole::Ai => "assistant",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }

    /// Extract the text of the first choice.
    fn parse_response(body: &Value) -> Result<String> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| RagError::completion("No message in response"))?;

        message
            .get("content")
            .and_then(|c| c.as_str())
            .map(String::from)
            .ok_or_else(|| RagError::completion("Response message has no text content"))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending completion request");

        let body = http::post_json(&self.client, &url, &self.api_key, &self.request_body(prompt))
            .await
            .map_err(RagError::completion)?;

        Self::parse_response(&body)
    }
}

/// Native output dimension of well-known embedding models.
fn known_embedding_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        _ => None,
    }
}

/// Embedder behind an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    /// Sent as `dimensions` only when configured explicitly.
    requested_dimension: Option<usize>,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Shares the endpoint and credentials of the completion config.
    pub fn new(completion: &CompletionConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let api_key = http::api_key(&completion.api_key_env, &completion.base_url)?;
        Self::with_key(completion, embedding, api_key)
    }

    pub fn with_key(
        completion: &CompletionConfig,
        embedding: &EmbeddingConfig,
        api_key: String,
    ) -> Result<Self> {
        let dimension = embedding
            .dimension
            .or_else(|| known_embedding_dimension(&embedding.model))
            .ok_or_else(|| {
                RagError::config(format!(
                    "embedding.dimension must be set for model '{}'",
                    embedding.model
                ))
            })?;

        Ok(Self {
            client: http::client(completion.timeout_secs)?,
            base_url: completion.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: embedding.model.clone(),
            requested_dimension: embedding.dimension,
            dimension,
        })
    }

    fn request_body(&self, text: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "input": text,
        });
        if let Some(dimension) = self.requested_dimension {
            body["dimensions"] = json!(dimension);
        }
        body
    }

    fn parse_response(body: &Value, dimension: usize) -> Result<Vec<f32>> {
        let values = body
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(|e| e.as_array())
            .ok_or_else(|| RagError::embedding("No embedding in response"))?;

        let embedding: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<_>>()
            .ok_or_else(|| RagError::embedding("Embedding contains non-numeric values"))?;

        if embedding.len() != dimension {
            return Err(RagError::embedding(format!(
                "Expected {} dimensions, got {}",
                dimension,
                embedding.len()
            )));
        }
        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let response = http::post_json(&self.client, &url, &self.api_key, &self.request_body(text))
            .await
            .map_err(RagError::embedding)?;

        Self::parse_response(&response, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
