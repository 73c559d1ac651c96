use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::{
    BudgetAllocator, ChunkSelector, HeuristicEstimator, HistoryTruncator, RequestAssembler,
    TokenEstimator,
};
use super::upstream::{CompletionProvider, RetrievalProvider};
use crate::config::{BudgetConfig, PromptsConfig};
use crate::database::{records_to_conversation, ChatHistoryStore, NewChatRecord};
use crate::models::{ChatAnswer, ChatMessage, ChatRequest, ContextUsage};
use crate::utils::error::ApiError;

/// Answers one query: retrieve, fit context and history into the window,
/// complete, persist.
pub struct ChatService {
    retrieval: Arc<dyn RetrievalProvider>,
    completion: Arc<dyn CompletionProvider>,
    history_store: Arc<dyn ChatHistoryStore>,
    estimator: Arc<dyn TokenEstimator>,
    allocator: BudgetAllocator,
    chunk_selector: ChunkSelector,
    history_truncator: HistoryTruncator,
    assembler: RequestAssembler,
    no_results_message: String,
    history_records: usize,
}

impl ChatService {
    pub fn new(
        retrieval: Arc<dyn RetrievalProvider>,
        completion: Arc<dyn CompletionProvider>,
        history_store: Arc<dyn ChatHistoryStore>,
        budget: &BudgetConfig,
        prompts: &PromptsConfig,
    ) -> Self {
        Self {
            retrieval,
            completion,
            history_store,
            estimator: Arc::new(HeuristicEstimator::new(budget.tokens_per_char)),
            allocator: BudgetAllocator::from_config(budget),
            chunk_selector: ChunkSelector::new(
                budget.chunk_ordering,
                budget.truncation_marker.clone(),
            ),
            history_truncator: HistoryTruncator::new(
                budget.per_message_cap,
                budget.truncation_marker.clone(),
            ),
            assembler: RequestAssembler::new(prompts.system_prompt.clone()),
            no_results_message: prompts.no_results_message.clone(),
            history_records: budget.history_records,
        }
    }

    pub async fn answer(&self, request: ChatRequest) -> Result<ChatAnswer, ApiError> {
        let budget = self.allocator.allocate();
        let query = self.validate_query(request.query.as_ref(), budget.query_reserve)?;
        let user_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        // anonymous exchanges are not stored, so they belong to no thread
        let conversation_id =
            user_id.map(|_| request.conversation_id.unwrap_or_else(Uuid::new_v4));

        info!(
            "Chat request (user: {:?}, conversation: {:?}): {} chars",
            user_id,
            conversation_id,
            query.len()
        );

        let chunks = self.retrieval.retrieve(&query).await?;

        if chunks.is_empty() {
            info!("Retrieval returned no chunks, sending canned answer");
            let content = self.no_results_message.clone();
            let (record_id, persisted) =
                self.persist(user_id, conversation_id, &query, &content).await;
            return Ok(ChatAnswer {
                content,
                no_results: true,
                record_id,
                conversation_id,
                persisted,
                usage: ContextUsage {
                    context_allowance: budget.context_allowance,
                    history_allowance: budget.history_allowance,
                    ..ContextUsage::default()
                },
            });
        }

        // a thread is only replayed when the caller names it
        let history = match (request.history, user_id, request.conversation_id) {
            (Some(history), _, _) => history,
            (None, Some(user_id), Some(conversation_id)) => {
                self.load_history(user_id, conversation_id).await
            }
            _ => Vec::new(),
        };

        let estimator = self.estimator.as_ref();
        let context = self
            .chunk_selector
            .select(estimator, chunks, budget.context_allowance);
        let fitted = self
            .history_truncator
            .truncate(estimator, &history, budget.history_allowance);

        let usage_base = ContextUsage {
            context_allowance: budget.context_allowance,
            history_allowance: budget.history_allowance,
            context_tokens: context.total_tokens,
            chunks_included: context.texts.len(),
            chunks_dropped: context.dropped,
            history_messages: fitted.messages.len(),
            history_dropped: fitted.dropped,
            history_truncated: fitted.truncated,
            prompt_tokens: 0,
            truncated: context.truncated
                || context.dropped > 0
                || fitted.dropped > 0
                || fitted.truncated > 0,
        };

        let system_prompt = self.assembler.render_system_prompt(&context.context_block());
        let messages = self.assembler.assemble(system_prompt, fitted.messages, &query);
        let prompt_tokens = self.assembler.check_fit(estimator, &messages, &budget);

        let content = self
            .completion
            .complete(&messages, budget.response_reserve)
            .await?;

        let (record_id, persisted) =
            self.persist(user_id, conversation_id, &query, &content).await;

        Ok(ChatAnswer {
            content,
            no_results: false,
            record_id,
            conversation_id,
            persisted,
            usage: ContextUsage {
                prompt_tokens,
                ..usage_base
            },
        })
    }

    fn validate_query(
        &self,
        query: Option<&Value>,
        query_reserve: usize,
    ) -> Result<String, ApiError> {
        let query = match query {
            Some(Value::String(q)) if !q.trim().is_empty() => q.trim(),
            _ => {
                return Err(ApiError::Validation(
                    "Query is required and must be a non-empty string".to_string(),
                ))
            }
        };

        let tokens = self.estimator.estimate(query);
        if tokens > query_reserve {
            return Err(ApiError::Validation(format!(
                "Query is too long (~{} tokens, limit {})",
                tokens, query_reserve
            )));
        }

        Ok(query.to_string())
    }

    async fn load_history(&self, user_id: &str, conversation_id: Uuid) -> Vec<ChatMessage> {
        let listed = self
            .history_store
            .list_by_user(user_id, Some(conversation_id), self.history_records)
            .await;

        match listed {
            Ok(records) => {
                debug!(
                    "Loaded {} stored records of {} as history for {}",
                    records.len(),
                    conversation_id,
                    user_id
                );
                records_to_conversation(&records)
            }
            Err(e) => {
                warn!("Failed to load chat history for {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    async fn persist(
        &self,
        user_id: Option<&str>,
        conversation_id: Option<Uuid>,
        query: &str,
        response: &str,
    ) -> (Option<Uuid>, bool) {
        let Some(user_id) = user_id else {
            return (None, false);
        };

        let record = NewChatRecord {
            user_id: user_id.to_string(),
            conversation_id,
            query: query.to_string(),
            response: response.to_string(),
            is_public: false,
        };

        match self.history_store.append(record).await {
            Ok(stored) => (Some(stored.id), true),
            Err(e) => {
                warn!("Failed to persist chat record for {}: {}", user_id, e);
                (None, false)
            }
        }
    }
}
