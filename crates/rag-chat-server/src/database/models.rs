use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::ChatMessage;

const TITLE_MAX_CHARS: usize = 50;

/// One answered query, as stored in `chat_history`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Thread the record belongs to; `None` for records stored before threads existed
    pub conversation_id: Option<Uuid>,
    pub query: String,
    pub response: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    /// The record as a user/assistant pair.
    pub fn to_messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::user(self.query.clone()).with_timestamp(self.created_at),
            ChatMessage::assistant(self.response.clone()).with_timestamp(self.created_at),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct NewChatRecord {
    pub user_id: String,
    pub conversation_id: Option<Uuid>,
    pub query: String,
    pub response: String,
    pub is_public: bool,
}

impl NewChatRecord {
    pub fn into_record(self) -> ChatRecord {
        ChatRecord {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            query: self.query,
            response: self.response,
            is_public: self.is_public,
            created_at: Utc::now(),
        }
    }
}

/// One chat thread of a user, for the thread list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    /// Derived from the first query of the thread
    pub title: String,
    pub last_message: String,
    pub record_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Thread title: the opening query, cut to a short label.
pub fn conversation_title(first_query: &str) -> String {
    first_query.trim().chars().take(TITLE_MAX_CHARS).collect()
}

/// Replay records (newest first, as listed) as a chronological conversation.
pub fn records_to_conversation(records: &[ChatRecord]) -> Vec<ChatMessage> {
    records.iter().rev().flat_map(ChatRecord::to_messages).collect()
}
