pub mod memory;
pub mod models;
pub mod pool;
pub mod repository;

pub use memory::InMemoryChatHistory;
pub use models::*;
pub use pool::DbPool;
pub use repository::{ChatHistoryRepository, ChatHistoryStore};

#[cfg(test)]
pub use repository::MockChatHistoryStore;
