//! Core data models used throughout ragchat.
//!
//! These types represent the chunks that flow through the ingestion
//! pipeline and the chat records that flow through generation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat chunk metadata. After sanitizing, every value is a scalar
/// (string, number, boolean, or null).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A unit of extracted document text plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Build a sibling chunk that shares this chunk's metadata.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A chunk that has been written to the vector store under `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub chunk: Chunk,
}

impl IndexedDocument {
    /// Pair `chunk` with a fresh UUID v4.
    pub fn assign(chunk: Chunk) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chunk,
        }
    }
}

/// A chunk returned from a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: Metadata,
    /// Cosine similarity against the query; higher is closer.
    pub score: f32,
}

/// A user's message within a chat. `id` is caller supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatQuery {
    pub id: i64,
    pub content: String,
}

impl ChatQuery {
    pub fn new(id: i64, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
        }
    }
}

/// A generated reply. `id` is random, positive, and not sequential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: i64,
    pub content: String,
}

impl ChatResponse {
    /// Wrap model output in a response with a freshly generated id.
    pub fn generated(content: impl Into<String>) -> Self {
        Self {
            id: random_positive_id(),
            content: content.into(),
        }
    }
}

/// One query/response pair within a chat's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub id_exchange: i64,
    pub id_chat: i64,
    pub query: ChatQuery,
    pub response: ChatResponse,
}

/// Listing view of a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDebrief {
    pub id_chat: i64,
    pub name: String,
    pub summary: String,
}

/// A chat with its full, insertion-ordered history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDetails {
    pub id_chat: i64,
    pub name: String,
    pub summary: String,
    /// Number of completed query turns.
    #[serde(default)]
    pub turns: u64,
    #[serde(default)]
    pub history: Vec<ChatExchange>,
}

impl ChatDetails {
    /// An empty chat, as created on the first query against an unknown id.
    pub fn empty(id_chat: i64) -> Self {
        Self {
            id_chat,
            name: default_chat_name(id_chat),
            summary: String::new(),
            turns: 0,
            history: Vec::new(),
        }
    }

    pub fn debrief(&self) -> ChatDebrief {
        ChatDebrief {
            id_chat: self.id_chat,
            name: self.name.clone(),
            summary: self.summary.clone(),
        }
    }
}

pub fn default_chat_name(id_chat: i64) -> String {
    format!("Chat #{}", id_chat)
}

/// A message in an LLM-facing conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum ConversationMessage {
    User(String),
    Assistant(String),
    System(String),
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ConversationMessage::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ConversationMessage::Assistant(content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        ConversationMessage::System(content.into())
    }

    pub fn content(&self) -> &str {
        match self {
            ConversationMessage::User(c)
            | ConversationMessage::Assistant(c)
            | ConversationMessage::System(c) => c,
        }
    }

    /// Display label used in diagnostic renderings.
    pub fn role_label(&self) -> &'static str {
        match self {
            ConversationMessage::User(_) => "User",
            ConversationMessage::Assistant(_) => "Assistant",
            ConversationMessage::System(_) => "System",
        }
    }

    /// Role name as chat-completion APIs expect it.
    pub fn api_role(&self) -> &'static str {
        match self {
            ConversationMessage::User(_) => "user",
            ConversationMessage::Assistant(_) => "assistant",
            ConversationMessage::System(_) => "system",
        }
    }

}

impl fmt::Display for ConversationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role_label(), self.content())
    }
}

/// Random positive 63-bit identifier taken from the high bits of a v4 UUID.
pub fn random_positive_id() -> i64 {
    let high = (uuid::Uuid::new_v4().as_u128() >> 65) as i64;
    high.max(1)
}
