//! Model-provider contract: request/response types and the streaming event
//! vocabulary shared by providers and the conversation controller.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::message::{Message, ToolCall};
use crate::tools::ToolDefinition;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(rhs.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(rhs.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
    /// The controller stopped looping with tool calls still pending.
    MaxIterations,
    Other(String),
}

impl FinishReason {
    /// Map a provider's wire value (`"stop"`, `"tool_calls"`, ...).
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stop" | "end_turn" => Self::Stop,
            "tool_calls" | "tool_use" => Self::ToolCalls,
            "length" | "max_tokens" => Self::Length,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A complete model (or controller) response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatResponse {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            finish_reason: FinishReason::ToolCalls,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Streaming events. Providers emit deltas followed by `Complete`; the
/// controller re-emits deltas and terminates its own stream with exactly one
/// `Complete` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    ContentDelta(String),
    ThinkingDelta(String),
    ToolUseStart { id: String, name: String },
    ToolUseDelta { id: String, input: String },
    ToolUseStop { id: String },
    Complete(ChatResponse),
    Error(String),
}

impl ChatEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}

pub type ChatStream = Pin<Box<dyn Stream<Item = anyhow::Result<ChatEvent>> + Send>>;

/// Static facts about the model behind a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub context_window: usize,
    pub default_max_tokens: usize,
    pub supports_reasoning: bool,
    pub supports_attachments: bool,
}

/// Replay a finished response as the event sequence a streaming provider
/// would have produced.
#[must_use]
pub fn replay_events(response: ChatResponse) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    if let Some(thinking) = response.thinking.as_ref().filter(|t| !t.is_empty()) {
        events.push(ChatEvent::ThinkingDelta(thinking.clone()));
    }
    if !response.content.is_empty() {
        events.push(ChatEvent::ContentDelta(response.content.clone()));
    }
    for call in &response.tool_calls {
        events.push(ChatEvent::ToolUseStart {
            id: call.id.clone(),
            name: call.name.clone(),
        });
        if !call.input.is_empty() {
            events.push(ChatEvent::ToolUseDelta {
                id: call.id.clone(),
                input: call.input.clone(),
            });
        }
        events.push(ChatEvent::ToolUseStop {
            id: call.id.clone(),
        });
    }
    events.push(ChatEvent::Complete(response));
    events
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatResponse>;

    /// Stream a response. Providers without native streaming replay the
    /// blocking response.
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatStream> {
        let response = self.chat(messages, tools).await?;
        let events = replay_events(response).into_iter().map(Ok);
        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn model_info(&self) -> ModelInfo;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}
