//! Scripted collaborators for tests across the workspace.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::message::Message;
use crate::provider::{ChatEvent, ChatResponse, ChatStream, LLMProvider, ModelInfo, replay_events};
use crate::session::Session;
use crate::tools::{Tool, ToolDefinition, schema_object};

/// One scripted provider reaction.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(ChatResponse),
    Fail(String),
    /// Raw stream items; `Err` items surface as stream errors.
    Stream(Vec<Result<ChatEvent, String>>),
}

/// Provider that replays a fixed script and records every request.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Vec<Message>>>,
    calls: AtomicUsize,
    fallback: Option<ChatResponse>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        }
    }

    /// Provider that answers every request with the same response.
    #[must_use]
    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_step(&self, messages: &[Message]) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        let next = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| {
            self.fallback.clone().map_or_else(
                || Step::Fail("script exhausted".to_string()),
                Step::Respond,
            )
        })
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatResponse> {
        match self.next_step(messages) {
            Step::Respond(response) => Ok(response),
            Step::Fail(reason) => Err(anyhow::anyhow!(reason)),
            Step::Stream(_) => Err(anyhow::anyhow!("stream step used by blocking call")),
        }
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatStream> {
        let items: Vec<anyhow::Result<ChatEvent>> = match self.next_step(messages) {
            Step::Respond(response) => replay_events(response).into_iter().map(Ok).collect(),
            Step::Fail(reason) => return Err(anyhow::anyhow!(reason)),
            Step::Stream(items) => items
                .into_iter()
                .map(|item| item.map_err(|e| anyhow::anyhow!(e)))
                .collect(),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "scripted".to_string(),
            context_window: 8192,
            default_max_tokens: 1024,
            supports_reasoning: false,
            supports_attachments: false,
        }
    }
}

/// Session kept in memory whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingSession {
    messages: Mutex<Vec<Message>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl RecordingSession {
    #[must_use]
    pub fn with_history(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Session for RecordingSession {
    fn id(&self) -> &str {
        "recording"
    }

    async fn messages(&self, limit: Option<usize>) -> anyhow::Result<Vec<Message>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("session read failed");
        }
        let all = self.snapshot();
        let start = limit.map_or(0, |n| all.len().saturating_sub(n));
        Ok(all[start..].to_vec())
    }

    async fn add_messages(&self, messages: &[Message]) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("session write failed");
        }
        for msg in messages {
            msg.validate()?;
        }
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(messages);
        Ok(())
    }

    async fn pop_message(&self) -> anyhow::Result<Option<Message>> {
        Ok(self
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Returns its input serialized as JSON.
#[derive(Debug, Clone, Copy)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".into(),
            description: "Echo the input back".into(),
            input_schema: schema_object(serde_json::json!({}), &[]),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> anyhow::Result<String> {
        Ok(input.to_string())
    }
}

/// Always fails with "boom".
#[derive(Debug, Clone, Copy)]
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &'static str {
        "fail"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fail".into(),
            description: "Always fails".into(),
            input_schema: schema_object(serde_json::json!({}), &[]),
        }
    }

    async fn execute(&self, _input: serde_json::Value) -> anyhow::Result<String> {
        anyhow::bail!("boom")
    }
}
