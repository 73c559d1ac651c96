use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::upstream::{parse_json, read_body, RetrievalProvider};
use crate::config::RetrievalConfig;
use crate::models::RetrievedChunk;
use crate::utils::error::ApiError;

const SERVICE: &str = "retrieval service";

#[derive(Debug, Serialize)]
struct RetrievalRequest<'a> {
    query: &'a str,
    filters: RetrievalFilters<'a>,
}

#[derive(Debug, Serialize)]
struct RetrievalFilters<'a> {
    scope: &'a str,
}

/// HTTP client for the document-retrieval service.
#[derive(Clone)]
pub struct RetrievalService {
    client: Client,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.config.api_key)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::unavailable(SERVICE, e.to_string()))?;

        let body = read_body(SERVICE, response).await?;
        parse_json(SERVICE, &body)
    }

    /// All documents visible to the API key.
    ///
    /// The service answers with either a bare array or `{"documents": [...]}`.
    pub async fn list_documents(&self) -> Result<Vec<Value>, ApiError> {
        let data = self.get_json("/documents").await?;
        let documents = match data {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("documents") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        info!("Listed {} documents", documents.len());
        Ok(documents)
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Value, ApiError> {
        validate_document_id(document_id)?;
        self.get_json(&format!("/documents/{}", document_id)).await
    }

    pub async fn get_document_summary(&self, document_id: &str) -> Result<Value, ApiError> {
        validate_document_id(document_id)?;
        self.get_json(&format!("/documents/{}/summary", document_id)).await
    }
}

#[async_trait]
impl RetrievalProvider for RetrievalService {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, ApiError> {
        info!("Retrieving chunks (scope={}, query_len={})", self.config.scope, query.len());

        let request = RetrievalRequest {
            query,
            filters: RetrievalFilters {
                scope: &self.config.scope,
            },
        };

        let response = self
            .client
            .post(self.url("/retrievals"))
            .bearer_auth(&self.config.api_key)
            .header("accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::unavailable(SERVICE, e.to_string()))?;

        let body = read_body(SERVICE, response).await.map_err(|e| match e {
            ApiError::NotFound(msg) => ApiError::bad_upstream(SERVICE, msg),
            other => other,
        })?;

        parse_scored_chunks(&parse_json(SERVICE, &body)?)
    }
}

/// Validate the `scored_chunks` array and keep chunks with usable text.
fn parse_scored_chunks(data: &Value) -> Result<Vec<RetrievedChunk>, ApiError> {
    let items = data
        .get("scored_chunks")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::bad_upstream(SERVICE, "missing or non-array scored_chunks"))?;

    let chunks: Vec<RetrievedChunk> = items
        .iter()
        .filter_map(|item| {
            let text = item.get("text").and_then(Value::as_str)?;
            if text.trim().is_empty() {
                return None;
            }
            let score = item.get("score").and_then(Value::as_f64);
            Some(RetrievedChunk::new(text, score))
        })
        .collect();

    if chunks.len() < items.len() {
        warn!("Skipped {} chunks without usable text", items.len() - chunks.len());
    }
    debug!("Retrieved {} chunks", chunks.len());

    Ok(chunks)
}

/// Document ids end up in an upstream URL path.
fn validate_document_id(document_id: &str) -> Result<(), ApiError> {
    let valid = !document_id.is_empty()
        && document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !valid {
        return Err(ApiError::Validation("Invalid document ID".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: &str) -> RetrievalService {
        RetrievalService::new(RetrievalConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            scope: "tutorial".to_string(),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_parse_skips_chunks_without_text() {
        let data = json!({
            "scored_chunks": [
                {"text": "alpha", "score": 0.8},
                {"text": 42},
                {"score": 0.3},
                {"text": "   "},
                {"text": "beta"}
            ]
        });
        let chunks = parse_scored_chunks(&data).unwrap();
        assert_eq!(
            chunks,
            vec![RetrievedChunk::new("alpha", Some(0.8)), RetrievedChunk::new("beta", None)]
        );
    }

    #[test]
    fn test_parse_rejects_missing_array() {
        assert!(matches!(
            parse_scored_chunks(&json!({"chunks": []})),
            Err(ApiError::BadUpstreamResponse { .. })
        ));
        assert!(matches!(
            parse_scored_chunks(&json!({"scored_chunks": "nope"})),
            Err(ApiError::BadUpstreamResponse { .. })
        ));
    }

    #[test]
    fn test_document_id_validation() {
        assert!(validate_document_id("doc_12-ab").is_ok());
        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("../admin").is_err());
        assert!(validate_document_id("a/b").is_err());
    }

    #[tokio::test]
    async fn test_retrieve_sends_query_and_scope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/retrievals"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(json!({"query": "what is rag?", "filters": {"scope": "tutorial"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "scored_chunks": [{"text": "RAG combines retrieval and generation", "score": 0.91}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chunks = service(&server.uri()).retrieve("what is rag?").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].score, Some(0.91));
    }

    #[tokio::test]
    async fn test_retrieve_503_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/retrievals"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = service(&server.uri()).retrieve("q").await.unwrap_err();
        assert!(matches!(err, ApiError::UpstreamUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_retrieve_malformed_body_is_bad_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/retrievals"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = service(&server.uri()).retrieve("q").await.unwrap_err();
        assert!(matches!(err, ApiError::BadUpstreamResponse { .. }));
    }

    #[tokio::test]
    async fn test_retrieve_connection_refused_is_unavailable() {
        // nothing listens on port 9 locally
        let err = service("http://127.0.0.1:9").retrieve("q").await.unwrap_err();
        assert!(matches!(err, ApiError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_list_documents_accepts_both_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [{"id": "d1"}, {"id": "d2"}]
            })))
            .mount(&server)
            .await;

        let docs = service(&server.uri()).list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "d1"}])))
            .mount(&server)
            .await;

        let docs = service(&server.uri()).list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_document_summary_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/missing/summary"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = service(&server.uri()).get_document_summary("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
