//! Token-budget-aware context assembly
//!
//! Fits retrieved passages and prior conversation into the model's context
//! window before a completion request:
//! - Token estimation (character-ratio heuristic)
//! - Budget partitioning between context and history
//! - Greedy chunk selection
//! - Oldest-first history eviction
//! - Final message list assembly

mod assembler;
mod budget;
mod chunk_selector;
mod history;
mod token_estimator;

pub use assembler::{RequestAssembler, CONTEXT_PLACEHOLDER};
pub use budget::{BudgetAllocator, TokenBudget};
pub use chunk_selector::{ChunkOrdering, ChunkSelector, SelectedContext};
pub use history::{HistoryTruncator, TruncatedHistory};
pub use token_estimator::{truncate_with_marker, HeuristicEstimator, TokenEstimator};
