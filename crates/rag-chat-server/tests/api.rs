use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rag_chat_server::config::settings::{DEFAULT_NO_RESULTS_MESSAGE, DEFAULT_SYSTEM_PROMPT};
use rag_chat_server::config::{
    BudgetConfig, LlmConfig, PromptsConfig, RetrievalConfig, ServerConfig, Settings, ShareConfig,
};
use rag_chat_server::database::InMemoryChatHistory;
use rag_chat_server::services::context::ChunkOrdering;
use rag_chat_server::services::InMemoryShareStore;
use rag_chat_server::{build_router, AppState};

fn settings(retrieval_url: &str, llm_url: &str) -> Settings {
    Settings {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_base_url: "https://chat.example.com".to_string(),
        },
        retrieval: RetrievalConfig {
            base_url: retrieval_url.to_string(),
            api_key: "ragie-key".to_string(),
            scope: "tutorial".to_string(),
            timeout_seconds: 5,
        },
        llm: LlmConfig {
            base_url: llm_url.to_string(),
            api_key: "openai-key".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            timeout_seconds: 5,
        },
        budget: BudgetConfig {
            context_window: 8000,
            response_reserve: 1000,
            system_prompt_reserve: 1000,
            query_reserve: 500,
            context_share: 0.5,
            per_message_cap: 1000,
            tokens_per_char: 0.25,
            chunk_ordering: ChunkOrdering::Relevance,
            history_records: 5,
            truncation_marker: "... (truncated)".to_string(),
        },
        prompts: PromptsConfig {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            no_results_message: DEFAULT_NO_RESULTS_MESSAGE.to_string(),
        },
        share: ShareConfig {
            ttl_seconds: 3600,
            cleanup_interval_seconds: 60,
        },
        database: None,
    }
}

struct TestApp {
    router: Router,
    retrieval: MockServer,
    llm: MockServer,
}

impl TestApp {
    async fn start() -> Self {
        let retrieval = MockServer::start().await;
        let llm = MockServer::start().await;

        let state = AppState::new(
            &settings(&retrieval.uri(), &llm.uri()),
            Arc::new(InMemoryChatHistory::new()),
            Arc::new(InMemoryShareStore::new(3600)),
        )
        .unwrap();

        Self {
            router: build_router(state),
            retrieval,
            llm,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn mock_retrieval(&self, response: ResponseTemplate, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/retrievals"))
            .respond_with(response)
            .expect(expected_calls)
            .mount(&self.retrieval)
            .await;
    }

    async fn mock_completion(&self, content: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .expect(expected_calls)
            .mount(&self.llm)
            .await;
    }
}

fn scored_chunks() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "scored_chunks": [
            {"text": "Ragie is a fully managed RAG-as-a-service.", "score": 0.92},
            {"text": "It exposes a retrievals endpoint.", "score": 0.81}
        ]
    }))
}

#[tokio::test]
async fn health_endpoints() {
    let app = TestApp::start().await;

    let (status, body) = app.send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn chat_answer_is_persisted_and_shareable_by_owner() {
    let app = TestApp::start().await;
    app.mock_retrieval(scored_chunks(), 1).await;
    app.mock_completion("Ragie is a managed retrieval service.", 1).await;

    let (status, answer) = app
        .send(
            Method::POST,
            "/api/chat",
            Some(json!({"query": "What is Ragie?", "user_id": "alice"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["content"], "Ragie is a managed retrieval service.");
    assert_eq!(answer["no_results"], false);
    assert_eq!(answer["persisted"], true);
    assert_eq!(answer["usage"]["chunks_included"], 2);
    let record_id = answer["record_id"].as_str().unwrap().to_string();

    let (status, history) = app.send(Method::GET, "/api/history?user_id=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    assert_eq!(history["records"][0]["query"], "What is Ragie?");
    assert_eq!(history["records"][0]["is_public"], false);

    let public_uri = format!("/api/history/{}/public", record_id);
    let (status, _) = app.send(Method::GET, &public_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let visibility_uri = format!("/api/history/{}/visibility", record_id);
    let (status, _) = app
        .send(
            Method::PATCH,
            &visibility_uri,
            Some(json!({"user_id": "mallory", "is_public": true})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, record) = app
        .send(
            Method::PATCH,
            &visibility_uri,
            Some(json!({"user_id": "alice", "is_public": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["is_public"], true);

    let (status, record) = app.send(Method::GET, &public_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["response"], "Ragie is a managed retrieval service.");
}

#[tokio::test]
async fn empty_retrieval_returns_canned_answer_without_completion() {
    let app = TestApp::start().await;
    app.mock_retrieval(
        ResponseTemplate::new(200).set_body_json(json!({"scored_chunks": []})),
        1,
    )
    .await;
    app.mock_completion("unused", 0).await;

    let (status, answer) = app
        .send(Method::POST, "/api/chat", Some(json!({"query": "Unknown topic"})))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["no_results"], true);
    assert_eq!(answer["content"], DEFAULT_NO_RESULTS_MESSAGE);
    assert_eq!(answer["persisted"], false);
}

#[tokio::test]
async fn retrieval_outage_is_retryable_503() {
    let app = TestApp::start().await;
    app.mock_retrieval(ResponseTemplate::new(503), 1).await;
    app.mock_completion("unused", 0).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/chat",
            Some(json!({"query": "What is Ragie?", "user_id": "alice"})),
        )
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "UpstreamUnavailable");
    assert_eq!(body["retryable"], true);

    let (_, history) = app.send(Method::GET, "/api/history?user_id=alice", None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn completion_without_text_is_bad_gateway() {
    let app = TestApp::start().await;
    app.mock_retrieval(scored_chunks(), 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&app.llm)
        .await;

    let (status, body) = app
        .send(Method::POST, "/api/chat", Some(json!({"query": "What is Ragie?"})))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "BadUpstreamResponse");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn invalid_chat_requests_are_rejected() {
    let app = TestApp::start().await;
    app.mock_retrieval(scored_chunks(), 0).await;

    for body in [json!({}), json!({"query": ""}), json!({"query": 7})] {
        let (status, error) = app.send(Method::POST, "/api/chat", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "ValidationError");
    }

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::GET, "/api/history", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_query_strings_are_validation_errors() {
    let app = TestApp::start().await;

    for uri in [
        "/api/history?user_id=alice&limit=abc",
        "/api/history?user_id=alice&conversation_id=not-a-uuid",
        "/api/conversations?user_id=alice&limit=-1",
    ] {
        let (status, body) = app.send(Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "ValidationError", "{}", uri);
    }
}

#[tokio::test]
async fn conversations_keep_threads_apart() {
    let app = TestApp::start().await;
    app.mock_retrieval(scored_chunks(), 3).await;
    app.mock_completion("An answer.", 3).await;

    let (_, first) = app
        .send(
            Method::POST,
            "/api/chat",
            Some(json!({"query": "How do refunds work?", "user_id": "alice"})),
        )
        .await;
    let refunds = first["conversation_id"].as_str().unwrap().to_string();

    let (_, follow_up) = app
        .send(
            Method::POST,
            "/api/chat",
            Some(json!({
                "query": "And for annual plans?",
                "user_id": "alice",
                "conversation_id": refunds
            })),
        )
        .await;
    assert_eq!(follow_up["conversation_id"], refunds.as_str());
    assert_eq!(follow_up["usage"]["history_messages"], 2);

    let (_, other) = app
        .send(
            Method::POST,
            "/api/chat",
            Some(json!({"query": "Visa rules?", "user_id": "alice"})),
        )
        .await;
    assert_ne!(other["conversation_id"], refunds.as_str());
    assert_eq!(other["usage"]["history_messages"], 0);

    let (status, listed) = app
        .send(Method::GET, "/api/conversations?user_id=alice", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 2);
    let thread = listed["conversations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["conversation_id"] == refunds.as_str())
        .unwrap();
    assert_eq!(thread["title"], "How do refunds work?");
    assert_eq!(thread["record_count"], 2);

    let uri = format!("/api/history?user_id=alice&conversation_id={}", refunds);
    let (_, history) = app.send(Method::GET, &uri, None).await;
    assert_eq!(history["total"], 2);
    assert_eq!(history["records"][0]["query"], "And for annual plans?");
}

#[tokio::test]
async fn share_round_trip() {
    let app = TestApp::start().await;

    let (status, link) = app
        .send(
            Method::POST,
            "/api/share",
            Some(json!({"query": "What is Ragie?", "response": "A RAG service."})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let share_id = link["share_id"].as_str().unwrap().to_string();
    assert_eq!(
        link["url"],
        format!("https://chat.example.com/share/{}", share_id)
    );
    assert!(link["x_intent_url"]
        .as_str()
        .unwrap()
        .starts_with("https://twitter.com/intent/tweet?text="));

    let (status, shared) = app
        .send(Method::GET, &format!("/api/share/{}", share_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shared["query"], "What is Ragie?");
    assert_eq!(shared["response"], "A RAG service.");

    let (status, shared) = app
        .send(Method::GET, &format!("/api/share?id={}", share_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shared["response"], "A RAG service.");

    let (status, _) = app.send(Method::GET, "/api/share?id=missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(Method::GET, "/api/share", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::POST, "/api/share", Some(json!({"response": 5})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn documents_are_proxied() {
    let app = TestApp::start().await;
    Mock::given(method("GET"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "doc-1", "name": "Guide"}]
        })))
        .mount(&app.retrieval)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"summary": "A guide."})))
        .mount(&app.retrieval)
        .await;

    let (status, body) = app.send(Method::GET, "/api/documents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["documents"][0]["name"], "Guide");

    let (status, body) = app
        .send(Method::GET, "/api/documents/doc-1/summary", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "A guide.");

    let (status, body) = app
        .send(Method::GET, "/api/documents/bad%20id/content", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}
