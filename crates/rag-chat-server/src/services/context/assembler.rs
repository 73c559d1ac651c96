use tracing::{debug, warn};

use super::budget::TokenBudget;
use super::token_estimator::TokenEstimator;
use crate::models::ChatMessage;

pub const CONTEXT_PLACEHOLDER: &str = "{{CONTEXT}}";

/// Builds the ordered message list handed to the completion service.
pub struct RequestAssembler {
    system_template: String,
}

impl RequestAssembler {
    pub fn new(system_template: impl Into<String>) -> Self {
        Self {
            system_template: system_template.into(),
        }
    }

    pub fn render_system_prompt(&self, context_block: &str) -> String {
        self.system_template.replace(CONTEXT_PLACEHOLDER, context_block)
    }

    /// `[system, ...history, user]`, no further validation.
    pub fn assemble(
        &self,
        system_prompt: String,
        history: Vec<ChatMessage>,
        query: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(history);
        messages.push(ChatMessage::user(query));
        messages
    }

    /// Estimated prompt size, warning when it overruns the budget.
    pub fn check_fit(
        &self,
        estimator: &dyn TokenEstimator,
        messages: &[ChatMessage],
        budget: &TokenBudget,
    ) -> usize {
        let prompt_tokens: usize = messages.iter().map(|m| estimator.estimate(&m.content)).sum();

        if prompt_tokens > budget.prompt_limit() {
            warn!(
                "Assembled prompt (~{} tokens) exceeds window minus response reserve ({}); \
                 check system_prompt_reserve",
                prompt_tokens,
                budget.prompt_limit()
            );
        } else {
            debug!(
                "Assembled {} messages, ~{} prompt tokens (limit {})",
                messages.len(),
                prompt_tokens,
                budget.prompt_limit()
            );
        }

        prompt_tokens
    }
}
