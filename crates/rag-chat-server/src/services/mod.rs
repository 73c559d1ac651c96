pub mod chat_service;
pub mod context;
pub mod llm_service;
pub mod retrieval_service;
pub mod share_service;
pub mod upstream;

pub use chat_service::ChatService;
pub use llm_service::LlmService;
pub use retrieval_service::RetrievalService;
pub use share_service::{InMemoryShareStore, ShareService, ShareStore};
pub use upstream::{CompletionProvider, RetrievalProvider};
