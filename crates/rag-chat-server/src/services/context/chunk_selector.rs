use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::token_estimator::{truncate_with_marker, TokenEstimator};
use crate::models::RetrievedChunk;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// How retrieved chunks are ranked before greedy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkOrdering {
    /// Descending score when every chunk has one, otherwise descending length
    #[default]
    Relevance,
    /// Always descending length
    Length,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedContext {
    pub texts: Vec<String>,
    pub total_tokens: usize,
    pub dropped: usize,
    pub truncated: bool,
}

impl SelectedContext {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// The block substituted into the system prompt.
    pub fn context_block(&self) -> String {
        self.texts.join(CONTEXT_SEPARATOR)
    }
}

pub struct ChunkSelector {
    ordering: ChunkOrdering,
    marker: String,
}

impl ChunkSelector {
    pub fn new(ordering: ChunkOrdering, marker: impl Into<String>) -> Self {
        Self {
            ordering,
            marker: marker.into(),
        }
    }

    /// Sort in place according to the ordering policy. The sort is stable.
    pub fn rank(&self, chunks: &mut [RetrievedChunk]) {
        let by_score = self.ordering == ChunkOrdering::Relevance
            && !chunks.is_empty()
            && chunks.iter().all(|c| c.score.is_some());

        if by_score {
            chunks.sort_by(|a, b| {
                let (a, b) = (a.score.unwrap_or(f64::MIN), b.score.unwrap_or(f64::MIN));
                b.partial_cmp(&a).unwrap_or(Ordering::Equal)
            });
        } else {
            // length stands in for informativeness when there is no score
            chunks.sort_by_key(|c| std::cmp::Reverse(c.text.graphemes(true).count()));
        }
    }

    /// Greedily take ranked chunks until the next one would exceed `allowance`.
    pub fn select(
        &self,
        estimator: &dyn TokenEstimator,
        mut chunks: Vec<RetrievedChunk>,
        allowance: usize,
    ) -> SelectedContext {
        self.rank(&mut chunks);

        let candidates = chunks.len();
        let mut selected = SelectedContext::default();

        // every chunk after the first also costs a separator in the context block
        let separator_tokens = estimator.estimate(CONTEXT_SEPARATOR);

        for chunk in &chunks {
            let mut tokens = estimator.estimate(&chunk.text);
            if !selected.is_empty() {
                tokens += separator_tokens;
            }
            if selected.total_tokens + tokens > allowance {
                break;
            }
            selected.total_tokens += tokens;
            selected.texts.push(chunk.text.clone());
        }

        if selected.is_empty() {
            if let Some(first) = chunks.first() {
                let cut = truncate_with_marker(estimator, &first.text, allowance, &self.marker);
                if !cut.is_empty() {
                    debug!(
                        "Top chunk alone exceeds context allowance ({} tokens), truncating",
                        allowance
                    );
                    selected.total_tokens = estimator.estimate(&cut);
                    selected.texts.push(cut);
                    selected.truncated = true;
                }
            }
        }

        selected.dropped = candidates - selected.texts.len();
        debug!(
            "Selected {}/{} chunks ({} tokens, allowance {})",
            selected.texts.len(),
            candidates,
            selected.total_tokens,
            allowance
        );

        selected
    }
}
