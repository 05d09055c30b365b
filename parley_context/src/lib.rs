#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Context fitting: deciding which messages reach the model when the
//! conversation no longer fits its token budget.
//!
//! # Strategies
//! - [`SlidingWindowStrategy`]: keep the newest N conversational messages
//! - [`TruncationStrategy`]: drop the oldest messages (optionally in
//!   user/assistant and tool-call units) until the budget is met
//! - [`SummarizationStrategy`]: compress older messages into a summary
//!   that is also persisted back to the session
//!
//! Strategies work on a borrowed history and never mutate it.

mod config;
mod sliding_window;
mod summarization;
mod truncation;

use async_trait::async_trait;
use parley_core::{Message, Role, TokenCounter, ToolDefinition};

pub use config::StrategyConfig;
pub use sliding_window::SlidingWindowStrategy;
pub use summarization::{SUMMARY_PREFIX, SUMMARY_SYSTEM_PROMPT, SummarizationStrategy};
pub use truncation::TruncationStrategy;

/// Everything a strategy may look at.
#[derive(Clone, Copy)]
pub struct StrategyInput<'a> {
    pub messages: &'a [Message],
    pub system_prompt: Option<&'a str>,
    pub tools: &'a [ToolDefinition],
    pub counter: &'a dyn TokenCounter,
    pub max_tokens: usize,
}

impl StrategyInput<'_> {
    #[must_use]
    pub fn count(&self, messages: &[Message]) -> usize {
        self.counter.count(messages, self.system_prompt, self.tools)
    }

    #[must_use]
    pub fn fits(&self, messages: &[Message]) -> bool {
        self.count(messages) <= self.max_tokens
    }
}

/// Messages to durably append to the session after fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    /// What to send to the model. Never contains summary-role messages.
    pub messages: Vec<Message>,
    pub session_update: Option<SessionUpdate>,
}

impl StrategyResult {
    #[must_use]
    pub const fn send_only(messages: Vec<Message>) -> Self {
        Self {
            messages,
            session_update: None,
        }
    }
}

#[async_trait]
pub trait ContextStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fit(&self, input: StrategyInput<'_>) -> anyhow::Result<StrategyResult>;
}

/// History as a model may receive it.
#[must_use]
pub fn model_view(messages: &[Message]) -> Vec<Message> {
    messages.iter().map(Message::for_model).collect()
}

/// Split into (system, conversational), preserving relative order.
#[must_use]
pub fn partition(messages: &[Message]) -> (Vec<Message>, Vec<Message>) {
    messages.iter().cloned().partition(|m| m.role == Role::System)
}

/// Recombine a partition into one list, system messages first.
#[must_use]
pub fn join(system: &[Message], conversational: &[Message]) -> Vec<Message> {
    system.iter().chain(conversational).cloned().collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_keeps_relative_order() {
        let messages = vec![
            Message::user("a"),
            Message::system("s"),
            Message::assistant("b"),
        ];
        let (system, convo) = partition(&messages);
        assert_eq!(system.len(), 1);
        assert_eq!(convo[0].text(), "a");
        assert_eq!(convo[1].text(), "b");
        assert_eq!(join(&system, &convo)[0].role, Role::System);
    }

    #[test]
    fn model_view_drops_summary_role() {
        let view = model_view(&[Message::summary("s"), Message::user("u")]);
        assert!(view.iter().all(|m| m.role == Role::User));
    }
}
