use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::models::{ChatAnswer, ChatRequest};
use crate::services::ChatService;
use crate::utils::error::ApiError;

pub async fn chat_handler(
    State(chat_service): State<Arc<ChatService>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let answer = chat_service.answer(request).await?;
    Ok(Json(answer))
}
