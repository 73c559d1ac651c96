use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or 5xx/429 from an upstream service
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable { service: &'static str, message: String },

    /// Upstream answered, but not with anything we can use
    #[error("Bad response from {service}: {message}")]
    BadUpstreamResponse { service: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        ApiError::UpstreamUnavailable { service, message: message.into() }
    }

    pub fn bad_upstream(service: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadUpstreamResponse { service, message: message.into() }
    }

    /// Category string exposed to the caller
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::NotFound(_) => "NotFound",
            ApiError::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            ApiError::BadUpstreamResponse { .. } => "BadUpstreamResponse",
            ApiError::Database(_) => "DatabaseError",
            ApiError::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadUpstreamResponse { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the UI should offer the user a retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::UpstreamUnavailable { .. })
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Validation(msg) | ApiError::NotFound(msg) => {
                tracing::warn!("{}", self);
                msg.clone()
            }
            ApiError::UpstreamUnavailable { service, .. } => {
                tracing::error!("{}", self);
                format!("The {} is currently unavailable. Please try again.", service)
            }
            ApiError::BadUpstreamResponse { service, .. } => {
                tracing::error!("{}", self);
                format!("The {} returned an invalid response.", service)
            }
            ApiError::Database(_) | ApiError::Internal(_) => {
                tracing::error!("{}", self);
                "Internal Server Error".to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: self.kind(),
            message,
            retryable: self.is_retryable(),
        });

        (status, body).into_response()
    }
}
