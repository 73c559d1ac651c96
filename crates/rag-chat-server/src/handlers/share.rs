use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::services::share_service::{ShareLink, SharedAnswer};
use crate::services::ShareService;
use crate::utils::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    #[serde(default)]
    pub query: Option<String>,
    /// Loose so that a non-string response is a validation error
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    pub id: Option<String>,
}

pub async fn create_share_handler(
    State(share_service): State<Arc<ShareService>>,
    payload: Result<Json<CreateShareRequest>, JsonRejection>,
) -> Result<Json<ShareLink>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let response = match request.response {
        Some(Value::String(response)) => response,
        _ => {
            return Err(ApiError::Validation(
                "Response is required and must be a string".to_string(),
            ))
        }
    };

    Ok(Json(share_service.create(request.query, response)?))
}

pub async fn get_share_by_query_handler(
    State(share_service): State<Arc<ShareService>>,
    params: Result<Query<ShareQuery>, QueryRejection>,
) -> Result<Json<SharedAnswer>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let id = params
        .id
        .ok_or_else(|| ApiError::Validation("Share ID is required".to_string()))?;

    Ok(Json(share_service.get(&id)?))
}

pub async fn get_share_handler(
    State(share_service): State<Arc<ShareService>>,
    Path(id): Path<String>,
) -> Result<Json<SharedAnswer>, ApiError> {
    Ok(Json(share_service.get(&id)?))
}
