use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use tracing::error;

use crate::models::{ChatMessage, RetrievedChunk};
use crate::utils::error::ApiError;

/// Source of scored passages for a query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, ApiError>;
}

/// Chat completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String, ApiError>;
}

/// Map a non-2xx upstream status to an error category.
///
/// 5xx, 408 and 429 are treated as the service being unavailable; anything
/// else means the service rejected or misunderstood the call.
pub(crate) fn classify_status(service: &'static str, status: StatusCode, body: &str) -> ApiError {
    error!("{} error: {} - {}", service, status, body);

    let message = format!("HTTP {}", status);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        ApiError::unavailable(service, message)
    } else if status == StatusCode::NOT_FOUND {
        ApiError::NotFound(format!("{} returned 404", service))
    } else {
        ApiError::bad_upstream(service, message)
    }
}

/// Read the body of a response, turning non-2xx statuses into errors.
pub(crate) async fn read_body(
    service: &'static str,
    response: Response,
) -> Result<String, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::unavailable(service, format!("failed to read body: {}", e)))?;

    if !status.is_success() {
        return Err(classify_status(service, status, &body));
    }

    Ok(body)
}

pub(crate) fn parse_json(service: &'static str, body: &str) -> Result<serde_json::Value, ApiError> {
    serde_json::from_str(body)
        .map_err(|e| ApiError::bad_upstream(service, format!("invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status("retrieval service", StatusCode::SERVICE_UNAVAILABLE, ""),
            ApiError::UpstreamUnavailable { .. }
        ));
        assert!(matches!(
            classify_status("retrieval service", StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::UpstreamUnavailable { .. }
        ));
        assert!(matches!(
            classify_status("retrieval service", StatusCode::UNAUTHORIZED, "bad key"),
            ApiError::BadUpstreamResponse { .. }
        ));
        assert!(matches!(
            classify_status("retrieval service", StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
    }
}
