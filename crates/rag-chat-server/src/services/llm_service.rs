use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::upstream::{parse_json, read_body, CompletionProvider};
use crate::config::LlmConfig;
use crate::models::{ChatMessage, Role};
use crate::utils::error::ApiError;

const SERVICE: &str = "completion service";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

/// Wire message: role and content only, timestamps stay local
#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: Role,
    content: &'a str,
}

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionProvider for LlmService {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String, ApiError> {
        debug!("Starting chat generation with {} messages", messages.len());

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::unavailable(SERVICE, e.to_string()))?;

        let body = read_body(SERVICE, response).await.map_err(|e| match e {
            ApiError::NotFound(msg) => ApiError::bad_upstream(SERVICE, msg),
            other => other,
        })?;

        extract_content(&parse_json(SERVICE, &body)?)
    }
}

/// Generated text lives at `choices[0].message.content`.
fn extract_content(data: &Value) -> Result<String, ApiError> {
    match data.pointer("/choices/0/message/content").and_then(Value::as_str) {
        Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
        _ => {
            error!("Completion response without generated text: {}", data);
            Err(ApiError::bad_upstream(SERVICE, "no generated text in response"))
        }
    }
}
