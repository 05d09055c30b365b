use std::sync::Arc;

use parley_core::LLMProvider;
use serde::{Deserialize, Serialize};

use crate::{ContextStrategy, SlidingWindowStrategy, SummarizationStrategy, TruncationStrategy};

/// Serializable choice of context strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    SlidingWindow {
        #[serde(default = "default_keep_last")]
        keep_last: usize,
    },
    Truncation {
        #[serde(default = "default_min_messages")]
        min_messages: usize,
        #[serde(default = "default_preserve_pairs")]
        preserve_pairs: bool,
    },
    Summarization {
        #[serde(default = "default_keep_recent")]
        keep_recent: usize,
    },
}

const fn default_keep_last() -> usize {
    SlidingWindowStrategy::DEFAULT_KEEP_LAST
}

const fn default_min_messages() -> usize {
    TruncationStrategy::DEFAULT_MIN_MESSAGES
}

const fn default_preserve_pairs() -> bool {
    true
}

const fn default_keep_recent() -> usize {
    SummarizationStrategy::DEFAULT_KEEP_RECENT
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::SlidingWindow {
            keep_last: default_keep_last(),
        }
    }
}

impl StrategyConfig {
    /// Build the strategy. `provider` is only used for summarization.
    #[must_use]
    pub fn build(&self, provider: Arc<dyn LLMProvider>) -> Arc<dyn ContextStrategy> {
        match *self {
            Self::SlidingWindow { keep_last } => Arc::new(SlidingWindowStrategy::new(keep_last)),
            Self::Truncation {
                min_messages,
                preserve_pairs,
            } => Arc::new(TruncationStrategy::new(min_messages, preserve_pairs)),
            Self::Summarization { keep_recent } => {
                Arc::new(SummarizationStrategy::new(provider, keep_recent))
            }
        }
    }
}
