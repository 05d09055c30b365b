//! Token counting for context budgeting.

use crate::message::Message;
use crate::tools::ToolDefinition;

pub trait TokenCounter: Send + Sync {
    fn count(&self, messages: &[Message], system_prompt: Option<&str>, tools: &[ToolDefinition])
    -> usize;
}

/// Character-based estimate: `chars / chars_per_token`, scaled by a safety
/// margin, plus a fixed overhead per message.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    chars_per_token: f64,
    safety_margin: f64,
    message_overhead: usize,
}

impl HeuristicTokenCounter {
    #[must_use]
    pub const fn new(chars_per_token: f64, safety_margin: f64, message_overhead: usize) -> Self {
        Self {
            chars_per_token,
            safety_margin,
            message_overhead,
        }
    }

    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn count_text(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        (chars / self.chars_per_token * self.safety_margin).ceil() as usize
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::new(4.0, 1.1, 4)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> usize {
        let prompt = system_prompt.map_or(0, |p| self.count_text(p) + self.message_overhead);
        let history: usize = messages
            .iter()
            .map(|m| self.count_text(&m.render()) + self.message_overhead)
            .sum();
        let tool_defs: usize = tools
            .iter()
            .map(|t| {
                self.count_text(&t.name)
                    + self.count_text(&t.description)
                    + self.count_text(&t.input_schema.to_string())
            })
            .sum();
        prompt + history + tool_defs
    }
}
