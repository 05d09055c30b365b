use async_trait::async_trait;
use tracing::debug;

use crate::{ContextStrategy, StrategyInput, StrategyResult, join, model_view, partition};

/// Keeps every system message plus the most recent `keep_last`
/// conversational messages once the history is over budget.
///
/// The trim only affects what is sent; stored history is untouched.
#[derive(Debug, Clone)]
pub struct SlidingWindowStrategy {
    keep_last: usize,
}

impl SlidingWindowStrategy {
    pub const DEFAULT_KEEP_LAST: usize = 10;

    #[must_use]
    pub const fn new(keep_last: usize) -> Self {
        Self { keep_last }
    }

    #[must_use]
    pub const fn keep_last(&self) -> usize {
        self.keep_last
    }
}

impl Default for SlidingWindowStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEEP_LAST)
    }
}

#[async_trait]
impl ContextStrategy for SlidingWindowStrategy {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    async fn fit(&self, input: StrategyInput<'_>) -> anyhow::Result<StrategyResult> {
        let view = model_view(input.messages);
        if input.fits(&view) {
            return Ok(StrategyResult::send_only(view));
        }

        let (system, convo) = partition(&view);
        let start = convo.len().saturating_sub(self.keep_last);
        debug!(
            "Sliding window keeping {} of {} conversational messages",
            convo.len() - start,
            convo.len()
        );
        Ok(StrategyResult::send_only(join(&system, &convo[start..])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{conversation, roles};
    use parley_core::{HeuristicTokenCounter, Message, Role};

    fn input<'a>(
        messages: &'a [Message],
        counter: &'a HeuristicTokenCounter,
        max_tokens: usize,
    ) -> StrategyInput<'a> {
        StrategyInput {
            messages,
            system_prompt: None,
            tools: &[],
            counter,
            max_tokens,
        }
    }

    #[tokio::test]
    async fn keeps_system_and_last_four() {
        let counter = HeuristicTokenCounter::default();
        let messages = conversation(10);
        let result = SlidingWindowStrategy::new(4)
            .fit(input(&messages, &counter, 50))
            .await
            .unwrap_or_else(|e| panic!("fit failed: {e}"));

        assert_eq!(result.messages.len(), 5);
        assert_eq!(result.messages[0].role, Role::System);
        assert_eq!(result.messages[1..], messages[7..]);
        assert!(result.session_update.is_none());
    }

    #[tokio::test]
    async fn window_ignores_token_count_of_what_remains() {
        let counter = HeuristicTokenCounter::default();
        let messages = conversation(10);
        // A budget of 1 cannot be met by any window; the last 4 are still kept.
        let result = SlidingWindowStrategy::new(4)
            .fit(input(&messages, &counter, 1))
            .await
            .unwrap_or_else(|e| panic!("fit failed: {e}"));
        assert_eq!(result.messages.len(), 5);
    }

    #[tokio::test]
    async fn under_budget_history_is_unchanged() {
        let counter = HeuristicTokenCounter::default();
        let mut messages = conversation(6);
        messages.insert(1, Message::summary("we met before"));
        let result = SlidingWindowStrategy::new(2)
            .fit(input(&messages, &counter, 100_000))
            .await
            .unwrap_or_else(|e| panic!("fit failed: {e}"));

        assert_eq!(result.messages.len(), messages.len());
        assert_eq!(roles(&result.messages)[1], Role::User);
        assert!(result.session_update.is_none());
    }
}
