use unicode_segmentation::UnicodeSegmentation;

/// Maps text to a token count for budgeting.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;

    /// Longest prefix of `text` whose estimate is at most `max_tokens`.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;
}

/// Character-ratio heuristic: `ceil(graphemes * tokens_per_char)`.
///
/// Only approximate; the real tokenizer may count more or fewer tokens.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicEstimator {
    tokens_per_char: f64,
}

impl HeuristicEstimator {
    pub fn new(tokens_per_char: f64) -> Self {
        Self { tokens_per_char }
    }

    fn tokens_for(&self, graphemes: usize) -> usize {
        (graphemes as f64 * self.tokens_per_char).ceil() as usize
    }
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.tokens_for(text.graphemes(true).count())
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let mut keep = (max_tokens as f64 / self.tokens_per_char).floor() as usize;
        // float rounding can put us one grapheme over
        while keep > 0 && self.tokens_for(keep) > max_tokens {
            keep -= 1;
        }

        match text.grapheme_indices(true).nth(keep) {
            Some((byte_idx, _)) => text[..byte_idx].to_string(),
            None => text.to_string(),
        }
    }
}

/// Cut `text` to `max_tokens` and append `marker`, keeping the result within budget.
///
/// Text that already fits is returned unchanged. If the marker alone does not
/// fit, the bare prefix is returned.
pub fn truncate_with_marker(
    estimator: &dyn TokenEstimator,
    text: &str,
    max_tokens: usize,
    marker: &str,
) -> String {
    if estimator.estimate(text) <= max_tokens {
        return text.to_string();
    }

    let marker_tokens = estimator.estimate(marker);
    if marker_tokens >= max_tokens {
        return estimator.truncate(text, max_tokens);
    }

    let mut body = estimator.truncate(text, max_tokens - marker_tokens);
    body.truncate(body.trim_end().len());
    if body.is_empty() {
        return body;
    }
    body.push_str(marker);
    body
}
