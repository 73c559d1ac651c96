use tracing::{debug, warn};

use crate::config::BudgetConfig;

/// Per-request partition of the model context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub total: usize,
    pub response_reserve: usize,
    pub system_prompt_reserve: usize,
    pub query_reserve: usize,
    pub context_allowance: usize,
    pub history_allowance: usize,
}

impl TokenBudget {
    /// Room left once the fixed reserves are taken out.
    pub fn remaining(&self) -> usize {
        self.context_allowance + self.history_allowance
    }

    /// Upper bound for the estimated size of the assembled message list.
    pub fn prompt_limit(&self) -> usize {
        self.total.saturating_sub(self.response_reserve)
    }
}

#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    context_window: usize,
    response_reserve: usize,
    system_prompt_reserve: usize,
    query_reserve: usize,
    context_share: f64,
}

impl BudgetAllocator {
    pub fn new(
        context_window: usize,
        response_reserve: usize,
        system_prompt_reserve: usize,
        query_reserve: usize,
        context_share: f64,
    ) -> Self {
        Self {
            context_window,
            response_reserve,
            system_prompt_reserve,
            query_reserve,
            context_share: context_share.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &BudgetConfig) -> Self {
        Self::new(
            config.context_window,
            config.response_reserve,
            config.system_prompt_reserve,
            config.query_reserve,
            config.context_share,
        )
    }

    /// Split what is left after the reserves between context and history.
    ///
    /// An exhausted window yields zero allowances rather than an error.
    pub fn allocate(&self) -> TokenBudget {
        let remaining = self
            .context_window
            .saturating_sub(self.response_reserve)
            .saturating_sub(self.system_prompt_reserve)
            .saturating_sub(self.query_reserve);

        if remaining == 0 {
            warn!(
                "No token budget left for context or history \
                 (window={}, response={}, system={}, query={})",
                self.context_window,
                self.response_reserve,
                self.system_prompt_reserve,
                self.query_reserve
            );
        }

        let context_allowance = ((remaining as f64) * self.context_share).floor() as usize;
        let context_allowance = context_allowance.min(remaining);
        let history_allowance = remaining - context_allowance;

        debug!(
            "Token budget: total={}, context={}, history={}",
            self.context_window, context_allowance, history_allowance
        );

        TokenBudget {
            total: self.context_window,
            response_reserve: self.response_reserve,
            system_prompt_reserve: self.system_prompt_reserve,
            query_reserve: self.query_reserve,
            context_allowance,
            history_allowance,
        }
    }
}
