use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::services::RetrievalService;
use crate::utils::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<Value>,
    pub total: usize,
}

pub async fn list_documents_handler(
    State(retrieval): State<Arc<RetrievalService>>,
) -> Result<Json<ListDocumentsResponse>, ApiError> {
    let documents = retrieval.list_documents().await?;
    let total = documents.len();

    Ok(Json(ListDocumentsResponse { documents, total }))
}

pub async fn document_content_handler(
    State(retrieval): State<Arc<RetrievalService>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(retrieval.get_document(&document_id).await?))
}

pub async fn document_summary_handler(
    State(retrieval): State<Arc<RetrievalService>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(retrieval.get_document_summary(&document_id).await?))
}
