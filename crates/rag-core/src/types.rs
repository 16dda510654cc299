//! Core domain types for the retrieval and answer pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RagError;

/// Metadata key holding the originating file or URL of a passage.
pub const SOURCE_KEY: &str = "source";

/// Metadata key holding the tenant a passage was indexed for.
pub const TENANT_KEY: &str = "tenant";

/// A retrievable passage.
///
/// Retrievers produce documents and nothing downstream mutates their
/// content; fusion and reranking only reorder them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Passage text.
    pub content: String,

    /// Arbitrary metadata (source, tenant, page, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Stable identifier: `{metadata.source}-{sequence index}`.
    pub source_key: String,
}

impl Document {
    /// Create a document with an explicit source key and no metadata.
    pub fn new(content: impl Into<String>, source_key: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
            source_key: source_key.into(),
        }
    }

    /// Create the `index`-th passage of `source`.
    pub fn from_source(content: impl Into<String>, source: &str, index: usize) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(SOURCE_KEY.to_string(), serde_json::Value::from(source));

        Self {
            content: content.into(),
            metadata,
            source_key: format!("{}-{}", source, index),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The `source` metadata entry, if present and a string.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(|v| v.as_str())
    }

    /// The `tenant` metadata entry, if present and a string.
    pub fn tenant(&self) -> Option<&str> {
        self.metadata.get(TENANT_KEY).and_then(|v| v.as_str())
    }

    /// Key used to merge the same passage coming from different retrievers.
    pub fn fusion_key(&self) -> &str {
        self.content.trim()
    }
}

/// Ordered documents, best first. Rank is the 0-based position.
pub type RankedList = Vec<Document>;

/// A document with the score a ranking stage assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub document: Document,
    pub score: f64,
}

/// Identifies one conversation of one user: `userId#conversationId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId {
    user_id: String,
    conversation_id: String,
}

impl SessionId {
    /// Build a session id from its two halves.
    pub fn new(user_id: &str, conversation_id: &str) -> crate::Result<Self> {
        if user_id.is_empty() || conversation_id.is_empty() || user_id.contains('#') {
            return Err(RagError::InvalidSession {
                value: format!("{}#{}", user_id, conversation_id),
            });
        }

        Ok(Self {
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
        })
    }

    /// The owning user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The conversation within the user's account.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl FromStr for SessionId {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('#') {
            Some((user, conv)) if !user.is_empty() && !conv.is_empty() => Self::new(user, conv),
            _ => Err(RagError::InvalidSession {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for SessionId {
    type Error = RagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.user_id, self.conversation_id)
    }
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }
}

impl FromStr for Role {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" | "user" => Ok(Self::Human),
            "ai" | "assistant" => Ok(Self::Ai),
            other => Err(RagError::invalid_argument(format!("unknown role: {}", other))),
        }
    }
}

/// One message of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// Which evidence path answers a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Answer from the tenant's indexed documents.
    Retrieve,
    /// Answer from an external web search.
    Search,
    /// Small talk, no evidence.
    #[default]
    Chitchat,
}

impl Classification {
    pub const ALL: [Classification; 3] = [Self::Retrieve, Self::Search, Self::Chitchat];

    /// Interpret a raw model label.
    ///
    /// The label is trimmed and lowercased; anything other than exactly
    /// `retrieve`, `search` or `chitchat` becomes [`Classification::Chitchat`].
    /// This never fails.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "retrieve" => Self::Retrieve,
            "search" => Self::Search,
            "chitchat" => Self::Chitchat,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::Search => "search",
            Self::Chitchat => "chitchat",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a message inside a prompt sent to the chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    Human,
    Ai,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Human => Self::Human,
            Role::Ai => Self::Ai,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// An ordered list of messages for a single completion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    /// A prompt consisting of one human message.
    pub fn text(content: impl Into<String>) -> Self {
        let mut prompt = Self::default();
        prompt.push(PromptRole::Human, content);
        prompt
    }

    pub fn push(&mut self, role: PromptRole, content: impl Into<String>) {
        self.messages.push(PromptMessage {
            role,
            content: content.into(),
        });
    }

    /// Flatten into `role: content` lines.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    PromptRole::System => "system",
                    PromptRole::Human => "human",
                    PromptRole::Ai => "ai",
                };
                format!("{}: {}", role, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single result returned by the external web search tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    /// Result text; search APIs send `null` for pages they could not extract.
    #[serde(default)]
    pub content: Option<String>,
}

impl SearchHit {
    /// A hit carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// The result text, empty when the search API sent none.
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_from_source() {
        let doc = Document::from_source("  body text \n", "report.pdf", 3);
        assert_eq!(doc.source_key, "report.pdf-3");
        assert_eq!(doc.source(), Some("report.pdf"));
        assert_eq!(doc.fusion_key(), "body text");
        assert_eq!(doc.tenant(), None);
    }

    #[test]
    fn test_session_id_parse() {
        let id: SessionId = "user-1#conv-9".parse().unwrap();
        assert_eq!(id.user_id(), "user-1");
        assert_eq!(id.conversation_id(), "conv-9");
        assert_eq!(id.to_string(), "user-1#conv-9");

        // Split happens at the first separator.
        let id: SessionId = "u#c#extra".parse().unwrap();
        assert_eq!(id.conversation_id(), "c#extra");
    }

    #[test]
    fn test_session_id_rejects_malformed() {
        for bad in ["", "nouser", "#conv", "user#"] {
            assert!(bad.parse::<SessionId>().is_err(), "{:?} should fail", bad);
        }
        assert!(SessionId::new("a#b", "c").is_err());
    }

    #[test]
    fn test_classification_from_label() {
        assert_eq!(Classification::from_label("retrieve"), Classification::Retrieve);
        assert_eq!(Classification::from_label("  RETRIEVE \n"), Classification::Retrieve);
        assert_eq!(Classification::from_label("Search"), Classification::Search);
        assert_eq!(Classification::from_label("chitchat"), Classification::Chitchat);

        for junk in ["", "Retrieve!", "unknown", "retrieve search", "re trieve"] {
            assert_eq!(Classification::from_label(junk), Classification::Chitchat);
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("human".parse::<Role>().unwrap(), Role::Human);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Ai);
        assert!("robot".parse::<Role>().is_err());
    }

    #[test]
    fn test_prompt_render() {
        let mut prompt = Prompt::default();
        prompt.push(PromptRole::System, "be brief");
        prompt.push(PromptRole::Human, "hi");
        assert_eq!(prompt.render(), "system: be brief\nhuman: hi");
        assert_eq!(Prompt::text("q").messages.len(), 1);
    }

    #[test]
    fn test_session_id_serde() {
        let id = SessionId::new("u", "c").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"u#c\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_search_hit_null_content() {
        let hits: Vec<SearchHit> = serde_json::from_str(
            r#"[{"content": "Sunny"}, {"content": null, "url": "https://a.test"}, {}]"#,
        )
        .unwrap();

        let contents: Vec<&str> = hits.iter().map(|h| h.content()).collect();
        assert_eq!(contents, ["Sunny", "", ""]);
        assert_eq!(SearchHit::text("x").content(), "x");
    }
}
