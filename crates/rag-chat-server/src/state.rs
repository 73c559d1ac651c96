use anyhow::Result;
use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Settings;
use crate::database::ChatHistoryStore;
use crate::services::{ChatService, LlmService, RetrievalService, ShareService, ShareStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub retrieval_service: Arc<RetrievalService>,
    pub history_store: Arc<dyn ChatHistoryStore>,
    pub share_service: Arc<ShareService>,
}

impl AppState {
    /// Wire the HTTP clients and the chat pipeline around the given stores.
    pub fn new(
        settings: &Settings,
        history_store: Arc<dyn ChatHistoryStore>,
        share_store: Arc<dyn ShareStore>,
    ) -> Result<Self> {
        let retrieval_service = Arc::new(RetrievalService::new(settings.retrieval.clone())?);
        let llm_service = Arc::new(LlmService::new(settings.llm.clone())?);

        let chat_service = Arc::new(ChatService::new(
            retrieval_service.clone(),
            llm_service,
            history_store.clone(),
            &settings.budget,
            &settings.prompts,
        ));

        let share_service = Arc::new(ShareService::new(
            share_store,
            &settings.server.public_base_url,
        ));

        Ok(Self {
            chat_service,
            retrieval_service,
            history_store,
            share_service,
        })
    }
}

impl FromRef<AppState> for Arc<ChatService> {
    fn from_ref(state: &AppState) -> Self {
        state.chat_service.clone()
    }
}

impl FromRef<AppState> for Arc<RetrievalService> {
    fn from_ref(state: &AppState) -> Self {
        state.retrieval_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ChatHistoryStore> {
    fn from_ref(state: &AppState) -> Self {
        state.history_store.clone()
    }
}

impl FromRef<AppState> for Arc<ShareService> {
    fn from_ref(state: &AppState) -> Self {
        state.share_service.clone()
    }
}
