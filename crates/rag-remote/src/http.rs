//! Shared request plumbing.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use rag_core::{RagError, Result};

/// Build a client with a request timeout.
pub(crate) fn client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| RagError::config(format!("Failed to build HTTP client: {}", e)))
}

/// Resolve an API key from the environment.
///
/// Local endpoints (Ollama, vLLM, LM Studio) accept any bearer token.
pub(crate) fn api_key(env_var: &str, base_url: &str) -> Result<String> {
    if let Ok(key) = std::env::var(env_var) {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }
    if is_local(base_url) {
        debug!("No API key set for local endpoint; using dummy bearer token");
        return Ok("local".to_string());
    }
    Err(RagError::config(format!(
        "Environment variable '{}' is not set",
        env_var
    )))
}

fn is_local(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1")
}

/// POST `body` as JSON and return the parsed JSON response.
///
/// Transport, status and decoding failures are all reported as a plain
/// message; callers wrap it in their own error kind.
pub(crate) async fn post_json(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &Value,
) -> std::result::Result<Value, String> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .json(body)
        .send()
        .await
        .map_err(|e| format!("Request failed: {}", e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response body: {}", e))?;

    if !status.is_success() {
        return Err(format!("HTTP {}: {}", status.as_u16(), truncate(&text, 300)));
    }

    serde_json::from_str(&text).map_err(|e| format!("Invalid JSON: {}", e))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
