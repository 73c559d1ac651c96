use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::services::context::{
    ChunkOrdering, HeuristicEstimator, TokenEstimator, CONTEXT_PLACEHOLDER,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub budget: BudgetConfig,
    pub prompts: PromptsConfig,
    pub share: ShareConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL used when building share links, e.g. `https://chat.example.com`
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    pub base_url: String,
    pub api_key: String,
    /// Value sent as `filters.scope` on every retrieval
    pub scope: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// Context window partitioning. All values are in estimated tokens.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BudgetConfig {
    pub context_window: usize,
    pub response_reserve: usize,
    pub system_prompt_reserve: usize,
    pub query_reserve: usize,
    /// Fraction of the remaining budget given to retrieved context; the rest goes to history
    pub context_share: f64,
    pub per_message_cap: usize,
    pub tokens_per_char: f64,
    pub chunk_ordering: ChunkOrdering,
    /// Number of stored chat records replayed as history when the caller sends none
    pub history_records: usize,
    pub truncation_marker: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptsConfig {
    /// Template with a `{{CONTEXT}}` placeholder for the retrieved passages
    pub system_prompt: String,
    pub no_results_message: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShareConfig {
    pub ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
    #[serde(default = "default_pool_timeout_seconds")]
    pub pool_timeout_seconds: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_pool_max_size() -> u32 {
    10
}

fn default_pool_timeout_seconds() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"These are very important to follow:

You are "Ragie AI", a professional but friendly assistant helping the user with the information shown below.

Answer informally, directly and concisely, without a heading or greeting, but include everything relevant.
Use Markdown (bold, italic, paragraphs, lists) when it helps readability.
When writing LaTeX, delimit it with $$...$$.
Do not include raw item IDs or other raw fields from the source.
Do not use XML or other markup unless the user asks for it.

Here is all of the information available to answer the user:
===
{{CONTEXT}}
===

If the user asked for a search and nothing above matches, say that nothing was found
and suggest how they might find the information they need.

END SYSTEM INSTRUCTIONS"#;

pub const DEFAULT_NO_RESULTS_MESSAGE: &str =
    "I couldn't find any relevant information for your query. \
     Could you try rephrasing your question or using different keywords?";

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.public_base_url", "http://localhost:8080")?
            .set_default("retrieval.base_url", "https://api.ragie.ai")?
            .set_default("retrieval.api_key", "")?
            .set_default("retrieval.scope", "tutorial")?
            .set_default("retrieval.timeout_seconds", 30)?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.api_key", "")?
            .set_default("llm.model", "gpt-3.5-turbo")?
            .set_default("llm.temperature", 0.7)?
            .set_default("llm.timeout_seconds", 60)?
            .set_default("budget.context_window", 8000)?
            .set_default("budget.response_reserve", 1000)?
            .set_default("budget.system_prompt_reserve", 1000)?
            .set_default("budget.query_reserve", 500)?
            .set_default("budget.context_share", 0.5)?
            .set_default("budget.per_message_cap", 1000)?
            .set_default("budget.tokens_per_char", 0.25)?
            .set_default("budget.chunk_ordering", "relevance")?
            .set_default("budget.history_records", 5)?
            .set_default("budget.truncation_marker", "... (truncated)")?
            .set_default("prompts.system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("prompts.no_results_message", DEFAULT_NO_RESULTS_MESSAGE)?
            .set_default("share.ttl_seconds", 7 * 24 * 60 * 60)?
            .set_default("share.cleanup_interval_seconds", 600)?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("retrieval.api_key", std::env::var("RAGIE_API_KEY").ok())?
            .set_override_option("llm.api_key", std::env::var("OPENAI_API_KEY").ok())?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.api_key.trim().is_empty() {
            bail!("retrieval.api_key is not set (APP__RETRIEVAL__API_KEY or RAGIE_API_KEY)");
        }
        if self.llm.api_key.trim().is_empty() {
            bail!("llm.api_key is not set (APP__LLM__API_KEY or OPENAI_API_KEY)");
        }

        let budget = &self.budget;
        if budget.context_window == 0 {
            bail!("budget.context_window must be greater than zero");
        }
        if !(0.0..=1.0).contains(&budget.context_share) {
            bail!("budget.context_share must be within [0, 1], got {}", budget.context_share);
        }
        if !(budget.tokens_per_char > 0.0) {
            bail!("budget.tokens_per_char must be positive, got {}", budget.tokens_per_char);
        }
        if !self.prompts.system_prompt.contains(CONTEXT_PLACEHOLDER) {
            bail!("prompts.system_prompt must contain a {{{{CONTEXT}}}} placeholder");
        }

        let estimator = HeuristicEstimator::new(budget.tokens_per_char);
        let marker_tokens = estimator.estimate(&budget.truncation_marker);
        if budget.per_message_cap <= marker_tokens {
            bail!(
                "budget.per_message_cap ({}) must exceed the truncation marker (~{} tokens)",
                budget.per_message_cap,
                marker_tokens
            );
        }

        // the rendered prompt only fits the window if the bare template fits its reserve
        let template_tokens =
            estimator.estimate(&self.prompts.system_prompt.replace(CONTEXT_PLACEHOLDER, ""));
        if template_tokens > budget.system_prompt_reserve {
            bail!(
                "prompts.system_prompt (~{} tokens) exceeds budget.system_prompt_reserve ({})",
                template_tokens,
                budget.system_prompt_reserve
            );
        }

        let reserved =
            budget.response_reserve + budget.system_prompt_reserve + budget.query_reserve;
        if reserved >= budget.context_window {
            tracing::warn!(
                "Reserved tokens ({}) leave no room in a {}-token window; \
                 context and history will be empty",
                reserved,
                budget.context_window
            );
        }

        Ok(())
    }
}
