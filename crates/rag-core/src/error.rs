//! Error types for the retrieval and answer pipeline.

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur in the retrieval and answer pipeline.
///
/// Ambiguous router output and a disabled reranker are deliberately not
/// represented here: the former is coerced to chitchat, the latter is a
/// configuration state.
#[derive(Error, Debug)]
pub enum RagError {
    /// The tenant has no indexed documents yet.
    #[error("No indexed documents for tenant: {tenant}")]
    EmptyTenantIndex { tenant: String },

    /// No usable evidence could be gathered for a retrieve request.
    #[error("Retrieval failed: {message}")]
    RetrievalFailed { message: String },

    /// The language model call failed.
    #[error("Completion failed: {message}")]
    CompletionFailed { message: String },

    /// The external web search failed.
    #[error("Web search failed: {message}")]
    SearchFailed { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Cross-encoder scoring error.
    #[error("Rerank error: {message}")]
    Rerank { message: String },

    /// Malformed session identifier.
    #[error("Invalid session id: {value:?} (expected userId#conversationId)")]
    InvalidSession { value: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Create an empty tenant index error.
    pub fn empty_tenant(tenant: impl Into<String>) -> Self {
        Self::EmptyTenantIndex {
            tenant: tenant.into(),
        }
    }

    /// Create a retrieval failure.
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::RetrievalFailed {
            message: message.into(),
        }
    }

    /// Create a completion failure.
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionFailed {
            message: message.into(),
        }
    }

    /// Create a web search failure.
    pub fn search(message: impl Into<String>) -> Self {
        Self::SearchFailed {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a rerank error.
    pub fn rerank(message: impl Into<String>) -> Self {
        Self::Rerank {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error only means "nothing indexed for this tenant yet".
    pub fn is_empty_tenant(&self) -> bool {
        matches!(self, Self::EmptyTenantIndex { .. })
    }

    /// Stable error code for callers that map failures to user messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTenantIndex { .. } => "EMPTY_TENANT_INDEX",
            Self::RetrievalFailed { .. } => "RETRIEVAL_FAILED",
            Self::CompletionFailed { .. } => "COMPLETION_FAILED",
            Self::SearchFailed { .. } => "SEARCH_FAILED",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Rerank { .. } => "RERANK_ERROR",
            Self::InvalidSession { .. } => "INVALID_SESSION",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
