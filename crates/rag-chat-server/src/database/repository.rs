use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use super::models::{conversation_title, ChatRecord, ConversationSummary, NewChatRecord};
use super::DbPool;

/// Append-only store of answered queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn append(&self, record: NewChatRecord) -> Result<ChatRecord>;

    /// Records of one user, newest first, optionally limited to one thread.
    async fn list_by_user(
        &self,
        user_id: &str,
        conversation_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<ChatRecord>>;

    /// Threads of one user, most recently active first.
    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>>;

    /// Flip the privacy flag of a record owned by `user_id`. `None` if no such record.
    async fn set_visibility(
        &self,
        id: Uuid,
        user_id: &str,
        is_public: bool,
    ) -> Result<Option<ChatRecord>>;

    /// A record, only if it has been made public.
    async fn get_public(&self, id: Uuid) -> Result<Option<ChatRecord>>;

    async fn health_check(&self) -> Result<()>;
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    conversation_id: Uuid,
    first_query: String,
    last_message: String,
    record_count: i64,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for ConversationSummary {
    fn from(row: ConversationRow) -> Self {
        Self {
            conversation_id: row.conversation_id,
            title: conversation_title(&row.first_query),
            last_message: row.last_message,
            record_count: row.record_count,
            updated_at: row.updated_at,
        }
    }
}

pub struct ChatHistoryRepository {
    pub pool: DbPool,
}

impl ChatHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatHistoryStore for ChatHistoryRepository {
    async fn append(&self, record: NewChatRecord) -> Result<ChatRecord> {
        let record = sqlx::query_as::<_, ChatRecord>(
            r#"INSERT INTO chat_history
                   (id, user_id, conversation_id, query, response, is_public, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, NOW())
               RETURNING id, user_id, conversation_id, query, response, is_public, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.user_id)
        .bind(record.conversation_id)
        .bind(&record.query)
        .bind(&record.response)
        .bind(record.is_public)
        .fetch_one(self.pool.get_pool())
        .await?;

        debug!("Stored chat record {} for user {}", record.id, record.user_id);
        Ok(record)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        conversation_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<ChatRecord>> {
        let records = sqlx::query_as::<_, ChatRecord>(
            r#"SELECT id, user_id, conversation_id, query, response, is_public, created_at
               FROM chat_history
               WHERE user_id = $1
                 AND ($2::uuid IS NULL OR conversation_id = $2)
               ORDER BY created_at DESC
               LIMIT $3"#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(limit as i64)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(records)
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"SELECT conversation_id,
                      (ARRAY_AGG(query ORDER BY created_at ASC))[1]  AS first_query,
                      (ARRAY_AGG(query ORDER BY created_at DESC))[1] AS last_message,
                      COUNT(*)                                       AS record_count,
                      MAX(created_at)                                AS updated_at
               FROM chat_history
               WHERE user_id = $1 AND conversation_id IS NOT NULL
               GROUP BY conversation_id
               ORDER BY updated_at DESC
               LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(rows.into_iter().map(ConversationSummary::from).collect())
    }

    async fn set_visibility(
        &self,
        id: Uuid,
        user_id: &str,
        is_public: bool,
    ) -> Result<Option<ChatRecord>> {
        let record = sqlx::query_as::<_, ChatRecord>(
            r#"UPDATE chat_history
               SET is_public = $3
               WHERE id = $1 AND user_id = $2
               RETURNING id, user_id, conversation_id, query, response, is_public, created_at"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(is_public)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(record)
    }

    async fn get_public(&self, id: Uuid) -> Result<Option<ChatRecord>> {
        let record = sqlx::query_as::<_, ChatRecord>(
            r#"SELECT id, user_id, conversation_id, query, response, is_public, created_at
               FROM chat_history
               WHERE id = $1 AND is_public"#,
        )
        .bind(id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(record)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
