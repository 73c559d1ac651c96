pub mod chat;

pub use chat::{ChatAnswer, ChatMessage, ChatRequest, ContextUsage, RetrievedChunk, Role};
