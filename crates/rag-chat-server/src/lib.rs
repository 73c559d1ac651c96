pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

pub use state::AppState;

/// Request bodies are small JSON documents; history is the largest part.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    let api_routes = Router::new()
        .route("/api/chat", post(handlers::chat::chat_handler))
        .route("/api/history", get(handlers::history::list_history_handler))
        .route(
            "/api/conversations",
            get(handlers::history::list_conversations_handler),
        )
        .route(
            "/api/history/{id}/visibility",
            patch(handlers::history::set_visibility_handler),
        )
        .route(
            "/api/history/{id}/public",
            get(handlers::history::public_record_handler),
        )
        .route(
            "/api/share",
            post(handlers::share::create_share_handler)
                .get(handlers::share::get_share_by_query_handler),
        )
        .route("/api/share/{id}", get(handlers::share::get_share_handler))
        .route("/api/documents", get(handlers::documents::list_documents_handler))
        .route(
            "/api/documents/{id}/content",
            get(handlers::documents::document_content_handler),
        )
        .route(
            "/api/documents/{id}/summary",
            get(handlers::documents::document_summary_handler),
        );

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .with_state(state)
        // CORS
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CatchPanicLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
