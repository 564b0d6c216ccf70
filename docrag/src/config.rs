//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::prompt::DEFAULT_MAX_CONTEXT_LENGTH;
use crate::resolver::{DEFAULT_CONTEXT_LOOKBACK, DEFAULT_REFERENCE_LOOKBACK};
use crate::retrieval::{DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOP_K};
use crate::segmenter::SegmenterConfig;

/// Configuration parameters for [`RagPipeline`](crate::RagPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    /// Segmentation thresholds.
    pub segmenter: SegmenterConfig,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Minimum similarity score for the optional relevance post-filter.
    pub relevance_threshold: f32,
    /// Character budget for the rendered prompt context section.
    pub max_context_length: usize,
    /// Messages consulted for conversation-context resolution.
    pub context_lookback: usize,
    /// Messages consulted after a lexical document reference was detected.
    pub reference_lookback: usize,
    /// Conversation turns included in conversational prompts.
    pub history_turns: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            top_k: DEFAULT_TOP_K,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
            context_lookback: DEFAULT_CONTEXT_LOOKBACK,
            reference_lookback: DEFAULT_REFERENCE_LOOKBACK,
            history_turns: 5,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the segmentation thresholds.
    pub fn segmenter(mut self, segmenter: SegmenterConfig) -> Self {
        self.config.segmenter = segmenter;
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    /// Set the minimum similarity score for the relevance post-filter.
    pub fn relevance_threshold(mut self, threshold: f32) -> Self {
        self.config.relevance_threshold = threshold;
        self
    }

    /// Set the character budget for the prompt context section.
    pub fn max_context_length(mut self, length: usize) -> Self {
        self.config.max_context_length = length;
        self
    }

    /// Set the conversation-context and reference-detection lookbacks.
    pub fn lookback(mut self, context: usize, reference: usize) -> Self {
        self.config.context_lookback = context;
        self.config.reference_lookback = reference;
        self
    }

    /// Set the number of conversation turns included in prompts.
    pub fn history_turns(mut self, turns: usize) -> Self {
        self.config.history_turns = turns;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `segmenter.min_tokens > segmenter.max_tokens`
    /// - `top_k == 0` or `max_context_length == 0`
    /// - `relevance_threshold` is outside `[0, 1]`
    pub fn build(self) -> Result<RagConfig> {
        let segmenter = &self.config.segmenter;
        if segmenter.min_tokens > segmenter.max_tokens {
            return Err(RagError::ConfigError(format!(
                "min_tokens ({}) must not exceed max_tokens ({})",
                segmenter.min_tokens, segmenter.max_tokens
            )));
        }
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.max_context_length == 0 {
            return Err(RagError::ConfigError(
                "max_context_length must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.config.relevance_threshold) {
            return Err(RagError::ConfigError(format!(
                "relevance_threshold ({}) must be within [0, 1]",
                self.config.relevance_threshold
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RagConfig::builder().build().is_ok());
    }

    #[test]
    fn rejects_inverted_token_bounds() {
        let err = RagConfig::builder()
            .segmenter(SegmenterConfig { min_tokens: 500, max_tokens: 100, ..Default::default() })
            .build()
            .unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_zero_top_k() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
    }
}
