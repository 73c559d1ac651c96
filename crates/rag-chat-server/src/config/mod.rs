pub mod settings;

pub use settings::{
    BudgetConfig, DatabaseConfig, LlmConfig, PromptsConfig, RetrievalConfig, ServerConfig,
    Settings, ShareConfig,
};
