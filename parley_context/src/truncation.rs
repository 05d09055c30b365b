use async_trait::async_trait;
use parley_core::{Message, Role};
use tracing::debug;

use crate::{ContextStrategy, StrategyInput, StrategyResult, join, model_view, partition};

/// Drops the oldest conversational messages until the history fits.
///
/// With `preserve_pairs`, removal happens in units: a user message together
/// with the assistant reply that follows it, or an assistant tool-call message
/// together with the tool results that follow it. Removal stops before the
/// conversational message count would fall below `min_messages`.
#[derive(Debug, Clone)]
pub struct TruncationStrategy {
    min_messages: usize,
    preserve_pairs: bool,
}

impl TruncationStrategy {
    pub const DEFAULT_MIN_MESSAGES: usize = 2;

    #[must_use]
    pub const fn new(min_messages: usize, preserve_pairs: bool) -> Self {
        Self {
            min_messages,
            preserve_pairs,
        }
    }

    /// How many leading messages form the next removable unit.
    fn unit_len(&self, convo: &[Message]) -> usize {
        let Some(first) = convo.first() else {
            return 0;
        };
        if !self.preserve_pairs {
            return 1;
        }
        match first.role {
            Role::User if convo.get(1).is_some_and(|m| m.role == Role::Assistant) => 2,
            Role::Assistant if first.has_tool_calls() => {
                1 + convo[1..]
                    .iter()
                    .take_while(|m| m.role == Role::Tool)
                    .count()
            }
            _ => 1,
        }
    }
}

impl Default for TruncationStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_MESSAGES, true)
    }
}

#[async_trait]
impl ContextStrategy for TruncationStrategy {
    fn name(&self) -> &'static str {
        "truncation"
    }

    async fn fit(&self, input: StrategyInput<'_>) -> anyhow::Result<StrategyResult> {
        let view = model_view(input.messages);
        if input.fits(&view) {
            return Ok(StrategyResult::send_only(view));
        }

        let (system, mut convo) = partition(&view);
        let original = convo.len();
        while !input.fits(&join(&system, &convo)) {
            let unit = self.unit_len(&convo);
            if unit == 0 || convo.len() < unit + self.min_messages {
                break;
            }
            convo.drain(..unit);
        }

        debug!(
            "Truncation removed {} of {} conversational messages",
            original - convo.len(),
            original
        );
        Ok(StrategyResult::send_only(join(&system, &convo)))
    }
}
