use tracing::debug;

use super::token_estimator::{truncate_with_marker, TokenEstimator};
use crate::models::{ChatMessage, Role};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TruncatedHistory {
    pub messages: Vec<ChatMessage>,
    pub total_tokens: usize,
    /// Oldest messages evicted to fit the allowance
    pub dropped: usize,
    /// Messages whose content was cut, by the per-message cap or the final fit
    pub truncated: usize,
}

/// Fits a conversation (oldest first) into a token allowance.
///
/// Eviction is oldest-first: the most recent turns matter most for the
/// current query, so survivors are always a suffix of the input.
pub struct HistoryTruncator {
    per_message_cap: usize,
    marker: String,
}

impl HistoryTruncator {
    pub fn new(per_message_cap: usize, marker: impl Into<String>) -> Self {
        Self {
            per_message_cap,
            marker: marker.into(),
        }
    }

    pub fn truncate(
        &self,
        estimator: &dyn TokenEstimator,
        history: &[ChatMessage],
        allowance: usize,
    ) -> TruncatedHistory {
        let mut result = TruncatedHistory::default();

        // the assembler owns the only system message
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect();

        if allowance == 0 || messages.is_empty() {
            result.dropped = messages.len();
            return result;
        }

        for message in messages.iter_mut() {
            if estimator.estimate(&message.content) > self.per_message_cap {
                message.content = truncate_with_marker(
                    estimator,
                    &message.content,
                    self.per_message_cap,
                    &self.marker,
                );
                result.truncated += 1;
            }
        }

        // empty turns carry nothing for the model
        let before = messages.len();
        messages.retain(|m| !m.content.is_empty());
        result.dropped = before - messages.len();

        if messages.is_empty() {
            debug!("History empty after per-message cap of {} tokens", self.per_message_cap);
            return result;
        }

        let tokens: Vec<usize> = messages.iter().map(|m| estimator.estimate(&m.content)).collect();
        let mut total: usize = tokens.iter().sum();

        let mut start = 0;
        while total > allowance && messages.len() - start > 1 {
            total -= tokens[start];
            start += 1;
        }
        result.dropped += start;
        messages.drain(..start);

        if total > allowance {
            // exactly one message left and it alone is too big
            let last = &mut messages[0];
            last.content = truncate_with_marker(estimator, &last.content, allowance, &self.marker);
            total = estimator.estimate(&last.content);
            result.truncated += 1;

            if last.content.is_empty() {
                messages.clear();
                result.dropped += 1;
                total = 0;
            }
        }

        debug!(
            "History fitted: kept {} messages ({} tokens, allowance {}), dropped {}, truncated {}",
            messages.len(),
            total,
            allowance,
            result.dropped,
            result.truncated
        );

        result.messages = messages;
        result.total_tokens = total;
        result
    }
}
