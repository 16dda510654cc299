//! Configuration types for the retrieval and answer pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Retrieval pipeline configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Lexical index configuration.
    #[serde(default)]
    pub lexical: LexicalConfig,

    /// Web search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Chat completion endpoint configuration.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Passage splitting for indexing.
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: 30000,
        }
    }
}

/// Retrieval pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of nearest neighbours fetched by dense retrieval.
    #[serde(default = "default_dense_k")]
    pub dense_k: usize,

    /// Number of documents handed to the answer prompt.
    #[serde(default = "default_final_n")]
    pub final_n: usize,

    /// RRF constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Run the cross-encoder over the fused shortlist.
    #[serde(default = "default_true")]
    pub rerank_enabled: bool,

    /// How many fused documents the cross-encoder sees.
    #[serde(default = "default_rerank_window")]
    pub rerank_window: usize,

    /// Embed the raw query when hypothetical document generation fails.
    #[serde(default)]
    pub hyde_fallback_to_query: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_k: 10,
            final_n: 5,
            rrf_k: 60,
            rerank_enabled: true,
            rerank_window: 10,
            hyde_fallback_to_query: false,
        }
    }
}

/// Lexical index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalConfig {
    /// Maximum number of hits per lexical query.
    #[serde(default = "default_lexical_limit")]
    pub limit: usize,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

/// Web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of web results used as context.
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    /// Search API endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 3,
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
        }
    }
}

/// Chat completion endpoint (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            api_key_env: default_completion_key_env(),
            temperature: 0.5,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

/// Which embedder backs dense retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Offline feature-hashing embedder.
    #[default]
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Model name for remote providers.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension. Remote providers receive it only when set here.
    #[serde(default)]
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    /// Dimension of the offline hash embedder.
    pub fn hash_dimension(&self) -> usize {
        self.dimension.unwrap_or(DEFAULT_HASH_DIMENSION)
    }
}

/// Default dimension of the offline hash embedder.
pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Passage splitting configuration, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per passage.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive passages of one file.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            chunk_overlap: 500,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            model: default_embedding_model(),
            dimension: None,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u32 {
    30000
}

fn default_dense_k() -> usize {
    10
}

fn default_final_n() -> usize {
    5
}

fn default_rrf_k() -> u32 {
    60
}

fn default_rerank_window() -> usize {
    10
}

fn default_lexical_limit() -> usize {
    10
}

fn default_search_max_results() -> usize {
    3
}

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_completion_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_chunk_size() -> usize {
    10_000
}

fn default_chunk_overlap() -> usize {
    500
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rag-chat")
        .join("rag.db")
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rag-chat").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("rag-chat.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.rrf_k == 0 {
            return Err(RagError::config("retrieval.rrf_k must be positive"));
        }
        if r.dense_k == 0 {
            return Err(RagError::config("retrieval.dense_k must be positive"));
        }
        if r.final_n == 0 {
            return Err(RagError::config("retrieval.final_n must be positive"));
        }
        if r.rerank_enabled && r.rerank_window < r.final_n {
            return Err(RagError::config(format!(
                "retrieval.rerank_window ({}) must be at least final_n ({})",
                r.rerank_window, r.final_n
            )));
        }
        if self.lexical.limit == 0 {
            return Err(RagError::config("lexical.limit must be positive"));
        }
        if self.search.max_results == 0 {
            return Err(RagError::config("search.max_results must be positive"));
        }
        if self.embedding.dimension == Some(0) {
            return Err(RagError::config("embedding.dimension must be positive"));
        }
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(RagError::config("chunking.chunk_size must be positive"));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        Ok(())
    }
}
