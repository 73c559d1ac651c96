use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::models::{conversation_title, ChatRecord, ConversationSummary, NewChatRecord};
use super::repository::ChatHistoryStore;

/// Process-local history store, used when no database is configured.
///
/// Lost on restart and not shared between instances.
#[derive(Clone, Default)]
pub struct InMemoryChatHistory {
    records: Arc<DashMap<Uuid, ChatRecord>>,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        info!("Using in-memory chat history store");
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryChatHistory {
    async fn append(&self, record: NewChatRecord) -> Result<ChatRecord> {
        let record = record.into_record();
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        conversation_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<ChatRecord>> {
        let mut records: Vec<ChatRecord> = self
            .records
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .filter(|entry| conversation_id.is_none() || entry.conversation_id == conversation_id)
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>> {
        let mut threads: HashMap<Uuid, Vec<ChatRecord>> = HashMap::new();
        for entry in self.records.iter().filter(|entry| entry.user_id == user_id) {
            if let Some(conversation_id) = entry.conversation_id {
                threads
                    .entry(conversation_id)
                    .or_default()
                    .push(entry.value().clone());
            }
        }

        let mut summaries: Vec<ConversationSummary> = threads
            .into_iter()
            .filter_map(|(conversation_id, mut records)| {
                records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                let first = records.first()?;
                let last = records.last()?;
                Some(ConversationSummary {
                    conversation_id,
                    title: conversation_title(&first.query),
                    last_message: last.query.clone(),
                    record_count: records.len() as i64,
                    updated_at: last.created_at,
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn set_visibility(
        &self,
        id: Uuid,
        user_id: &str,
        is_public: bool,
    ) -> Result<Option<ChatRecord>> {
        match self.records.get_mut(&id) {
            Some(mut entry) if entry.user_id == user_id => {
                entry.is_public = is_public;
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_public(&self, id: Uuid) -> Result<Option<ChatRecord>> {
        Ok(self
            .records
            .get(&id)
            .filter(|entry| entry.is_public)
            .map(|entry| entry.value().clone()))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
