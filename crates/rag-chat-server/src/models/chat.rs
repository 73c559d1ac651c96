use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation, also the wire shape sent to the completion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp.to_rfc3339());
        self
    }
}

/// A passage returned by the retrieval service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RetrievedChunk {
    pub fn new(text: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Kept loose so a missing or non-string query is a validation error, not a 422
    #[serde(default)]
    pub query: Option<serde_json::Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Thread to continue. Stored history is only replayed from this thread.
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    /// Prior turns, oldest first. When absent, stored history of the thread is used.
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextUsage {
    pub context_allowance: usize,
    pub history_allowance: usize,
    pub context_tokens: usize,
    pub chunks_included: usize,
    pub chunks_dropped: usize,
    pub history_messages: usize,
    pub history_dropped: usize,
    pub history_truncated: usize,
    pub prompt_tokens: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub content: String,
    /// True when retrieval found nothing and the canned answer was returned
    pub no_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    /// Thread the exchange was stored under; a new one when the request named none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub persisted: bool,
    pub usage: ContextUsage,
}
