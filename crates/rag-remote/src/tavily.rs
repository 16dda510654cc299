//! Tavily web search.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use rag_core::{RagError, Result, SearchConfig, SearchHit, WebSearch};

use crate::http;

/// Request timeout for search calls, in seconds.
const SEARCH_TIMEOUT_SECS: u64 = 30;

pub struct TavilySearch {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl TavilySearch {
    /// Reads the API key from the environment variable named in `config`.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = http::api_key(&config.api_key_env, &config.endpoint)?;
        Ok(Self {
            client: http::client(SEARCH_TIMEOUT_SECS)?,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    fn parse_response(body: &Value) -> Result<Vec<SearchHit>> {
        let results = body
            .get("results")
            .ok_or_else(|| RagError::search("No results in response"))?;
        serde_json::from_value(results.clone())
            .map_err(|e| RagError::search(format!("Malformed results: {}", e)))
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let body = json!({
            "query": query,
            "max_results": max_results,
        });

        debug!(endpoint = %self.endpoint, "Sending web search request");

        let response = http::post_json(&self.client, &self.endpoint, &self.api_key, &body)
            .await
            .map_err(RagError::search)?;

        Self::parse_response(&response)
    }
}
