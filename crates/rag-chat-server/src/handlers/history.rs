use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::{ChatHistoryStore, ChatRecord, ConversationSummary};
use crate::utils::error::ApiError;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Option<String>,
    /// Only records of this thread
    pub conversation_id: Option<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<ChatRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub user_id: String,
    pub is_public: bool,
}

fn require_user_id(user_id: Option<String>) -> Result<String, ApiError> {
    user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("user_id is required".to_string()))
}

fn parse_record_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::Validation(format!("Invalid record id: {}", id)))
}

pub async fn list_history_handler(
    State(store): State<Arc<dyn ChatHistoryStore>>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let user_id = require_user_id(params.user_id)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let records = store
        .list_by_user(&user_id, params.conversation_id, limit)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let total = records.len();
    Ok(Json(HistoryResponse { records, total }))
}

pub async fn list_conversations_handler(
    State(store): State<Arc<dyn ChatHistoryStore>>,
    params: Result<Query<ConversationsQuery>, QueryRejection>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let user_id = require_user_id(params.user_id)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let conversations = store
        .list_conversations(&user_id, limit)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let total = conversations.len();
    Ok(Json(ConversationsResponse {
        conversations,
        total,
    }))
}

pub async fn set_visibility_handler(
    State(store): State<Arc<dyn ChatHistoryStore>>,
    Path(id): Path<String>,
    payload: Result<Json<VisibilityRequest>, JsonRejection>,
) -> Result<Json<ChatRecord>, ApiError> {
    let id = parse_record_id(&id)?;
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let record = store
        .set_visibility(id, &request.user_id, request.is_public)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Chat record {} not found", id)))?;

    info!("Record {} visibility set to public={}", id, record.is_public);
    Ok(Json(record))
}

pub async fn public_record_handler(
    State(store): State<Arc<dyn ChatHistoryStore>>,
    Path(id): Path<String>,
) -> Result<Json<ChatRecord>, ApiError> {
    let id = parse_record_id(&id)?;

    let record = store
        .get_public(id)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Chat record {} not found", id)))?;

    Ok(Json(record))
}
