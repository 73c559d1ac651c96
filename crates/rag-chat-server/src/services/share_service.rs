use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::utils::error::ApiError;

const X_INTENT_URL: &str = "https://twitter.com/intent/tweet";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedAnswer {
    pub query: Option<String>,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareLink {
    pub share_id: String,
    pub url: String,
    pub x_intent_url: String,
}

/// Key/value storage for shared answers.
pub trait ShareStore: Send + Sync {
    fn put(&self, id: String, answer: SharedAnswer);

    /// `None` when unknown or expired
    fn get(&self, id: &str) -> Option<SharedAnswer>;

    /// Returns number of entries removed
    fn cleanup_expired(&self) -> usize;
}

#[derive(Debug, Clone)]
struct ShareEntry {
    answer: SharedAnswer,
    expires_at: DateTime<Utc>,
}

impl ShareEntry {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Single-process share store. Entries expire after `ttl`; expired entries
/// are removed lazily on read and by `cleanup_expired`.
#[derive(Clone)]
pub struct InMemoryShareStore {
    storage: Arc<DashMap<String, ShareEntry>>,
    ttl: Duration,
}

impl InMemoryShareStore {
    pub fn new(ttl_seconds: u64) -> Self {
        info!("Initializing in-memory share store (ttl {}s)", ttl_seconds);
        Self {
            storage: Arc::new(DashMap::new()),
            ttl: i64::try_from(ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl ShareStore for InMemoryShareStore {
    fn put(&self, id: String, answer: SharedAnswer) {
        let expires_at = answer
            .created_at
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.storage.insert(id, ShareEntry { answer, expires_at });
    }

    fn get(&self, id: &str) -> Option<SharedAnswer> {
        // clone out so the shard lock is released before a possible remove
        let entry = self.storage.get(id)?.value().clone();

        if entry.is_expired() {
            self.storage.remove(id);
            debug!("Share {} expired, removed", id);
            return None;
        }

        Some(entry.answer)
    }

    fn cleanup_expired(&self) -> usize {
        let start_len = self.storage.len();
        self.storage.retain(|_, entry| !entry.is_expired());
        let count = start_len.saturating_sub(self.storage.len());

        if count > 0 {
            info!("Cleaned up {} expired shares", count);
        }

        count
    }
}

/// Creates and resolves share links.
pub struct ShareService {
    store: Arc<dyn ShareStore>,
    public_base_url: String,
}

impl ShareService {
    pub fn new(store: Arc<dyn ShareStore>, public_base_url: &str) -> Self {
        Self {
            store,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn create(&self, query: Option<String>, response: String) -> Result<ShareLink, ApiError> {
        if response.trim().is_empty() {
            return Err(ApiError::Validation(
                "Response is required and must be a non-empty string".to_string(),
            ));
        }

        let query = query.filter(|q| !q.trim().is_empty());
        let share_id = Uuid::new_v4().simple().to_string();
        let url = format!("{}/share/{}", self.public_base_url, share_id);
        let x_intent_url = x_intent_url(query.as_deref(), &response, &url)?;

        self.store.put(
            share_id.clone(),
            SharedAnswer {
                query,
                response,
                created_at: Utc::now(),
            },
        );
        debug!("Created share {}", share_id);

        Ok(ShareLink {
            share_id,
            url,
            x_intent_url,
        })
    }

    pub fn get(&self, share_id: &str) -> Result<SharedAnswer, ApiError> {
        if share_id.trim().is_empty() {
            return Err(ApiError::Validation("Share ID is required".to_string()));
        }

        self.store
            .get(share_id)
            .ok_or_else(|| ApiError::NotFound("Share not found".to_string()))
    }

    pub fn cleanup_expired(&self) -> usize {
        self.store.cleanup_expired()
    }
}

/// Pre-filled post intent for X: the question as a title when present.
fn x_intent_url(query: Option<&str>, response: &str, url: &str) -> Result<String, ApiError> {
    let text = match query {
        Some(q) => format!("{}\n\n{}", q, response),
        None => response.to_string(),
    };

    let intent = Url::parse_with_params(X_INTENT_URL, &[("text", text.as_str()), ("url", url)])
        .map_err(|e| ApiError::Internal(format!("Failed to build share intent: {}", e)))?;

    Ok(intent.to_string())
}
