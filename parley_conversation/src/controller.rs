use std::sync::Arc;

use parley_context::{StrategyInput, model_view};
use parley_core::{
    ChatEvent, ChatResponse, ContentPart, FinishReason, LLMProvider, Message, Role, Session,
    ToolDefinition, ToolExecutor, ToolRegistry, Usage,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::builder::ContextOptions;
use crate::context::TurnContext;
use crate::error::ConversationError;
use crate::memory::{MemoryHooks, with_memories};
use crate::stream::consume_stream;

/// Capacity of the event channel returned by [`ConversationController::chat_stream`].
pub const STREAM_BUFFER: usize = 64;

/// Drives one user turn: context fitting, the model / tool loop, persistence
/// and memory hooks.
///
/// Cloning is cheap; every collaborator is shared.
#[derive(Clone)]
pub struct ConversationController {
    pub(crate) provider: Arc<dyn LLMProvider>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) executor: ToolExecutor,
    pub(crate) max_iterations: usize,
    pub(crate) auto_execute_tools: bool,
    pub(crate) memory: Option<MemoryHooks>,
    pub(crate) default_owner: Option<String>,
    pub(crate) context: Option<ContextOptions>,
}

/// Where model output goes and how strictly writes are treated.
#[derive(Clone, Copy)]
enum TurnMode<'a> {
    /// Session writes after the history read are fatal.
    Blocking,
    /// Deltas are forwarded; session writes are best-effort.
    Streaming(&'a mpsc::Sender<ChatEvent>),
}

impl ConversationController {
    #[must_use]
    pub const fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    #[must_use]
    pub fn model_name(&self) -> String {
        self.provider.model_info().name
    }

    /// Run a turn and return the final response.
    #[tracing::instrument(skip(self, session, message, ctx), fields(session_id = session.id()))]
    pub async fn chat(
        &self,
        session: &dyn Session,
        message: Message,
        ctx: &TurnContext,
    ) -> Result<ChatResponse, ConversationError> {
        self.run_turn(session, message, ctx, TurnMode::Blocking)
            .await
    }

    /// Run a turn in the background, streaming its events.
    ///
    /// The receiver yields content, thinking and tool-use deltas in arrival
    /// order, then exactly one `Complete` or `Error`, then closes.
    pub fn chat_stream(
        &self,
        session: Arc<dyn Session>,
        message: Message,
        ctx: TurnContext,
    ) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let controller = self.clone();
        tokio::spawn(async move {
            let terminal = match controller
                .run_turn(session.as_ref(), message, &ctx, TurnMode::Streaming(&tx))
                .await
            {
                Ok(response) => ChatEvent::Complete(response),
                Err(e) => {
                    warn!("Streaming turn failed: {e}");
                    ChatEvent::Error(e.to_string())
                }
            };
            if tx.send(terminal).await.is_err() {
                debug!("Stream receiver dropped before the terminal event");
            }
        });
        rx
    }

    async fn run_turn(
        &self,
        session: &dyn Session,
        message: Message,
        ctx: &TurnContext,
        mode: TurnMode<'_>,
    ) -> Result<ChatResponse, ConversationError> {
        message.validate()?;

        let mut history = session
            .messages(None)
            .await
            .map_err(ConversationError::Session)?;
        info!(
            "Starting turn on session {} with {} stored message(s)",
            session.id(),
            history.len()
        );

        self.persist(session, std::slice::from_ref(&message), mode)
            .await?;

        let owner = ctx.owner_id.as_deref().or(self.default_owner.as_deref());
        let user_text = message.text();
        let system_prompt = self.effective_system_prompt(owner, &user_text).await;
        history.push(message);

        let tools = self.tools.definitions();
        let mut request = self
            .fit_context(session, &history, system_prompt.as_deref(), &tools)
            .await?;
        if let Some(prompt) = &system_prompt {
            request.insert(0, Message::system(prompt));
        }

        let mut iterations = 0;
        let mut usage: Option<Usage> = None;

        loop {
            if ctx.cancel.is_cancelled() {
                info!("Turn canceled after {iterations} tool round(s)");
                return Err(ConversationError::Cancelled);
            }

            let response = self.call_model(&request, &tools, ctx, mode).await?;
            if let Some(u) = response.usage {
                *usage.get_or_insert_with(Usage::default) += u;
            }

            let wants_tools = response.has_tool_calls();
            let capped = iterations >= self.max_iterations;
            if !wants_tools || !self.auto_execute_tools || capped {
                let finish_reason = if wants_tools && self.auto_execute_tools && capped {
                    warn!(
                        "Stopping after {} tool round(s) with {} call(s) pending",
                        iterations,
                        response.tool_calls.len()
                    );
                    FinishReason::MaxIterations
                } else {
                    response.finish_reason.clone()
                };
                return self
                    .finish_turn(session, owner, &user_text, response, usage, finish_reason, mode)
                    .await;
            }

            let assistant = self.assistant_message(&response, true);
            let results = self
                .executor
                .execute_batch(&response.tool_calls, &ctx.cancel)
                .await;
            let results_message = ToolExecutor::results_message(&results);

            let round = [assistant, results_message];
            self.persist(session, &round, mode).await?;
            request.extend(round);
            iterations += 1;
            debug!("Completed tool round {iterations}");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_turn(
        &self,
        session: &dyn Session,
        owner: Option<&str>,
        user_text: &str,
        response: ChatResponse,
        usage: Option<Usage>,
        finish_reason: FinishReason,
        mode: TurnMode<'_>,
    ) -> Result<ChatResponse, ConversationError> {
        let final_message = self.assistant_message(&response, false);
        if !final_message.is_empty() {
            self.persist(session, std::slice::from_ref(&final_message), mode)
                .await?;
        }

        if let Some(owner) = owner {
            self.spawn_memory_extraction(owner, session.id(), user_text, &response.content);
        }

        Ok(ChatResponse {
            model: response.model.or_else(|| Some(self.model_name())),
            usage,
            finish_reason,
            ..response
        })
    }

    /// Configured prompt plus relevant memories, computed for this call only.
    async fn effective_system_prompt(&self, owner: Option<&str>, query: &str) -> Option<String> {
        let base = self.system_prompt.as_deref();
        let (Some(memory), Some(owner)) = (&self.memory, owner) else {
            return base.map(str::to_string);
        };
        let memories = memory.relevant(owner, query).await;
        if !memories.is_empty() {
            debug!("Injecting {} memory item(s) for {owner}", memories.len());
        }
        with_memories(base, &memories)
    }

    async fn fit_context(
        &self,
        session: &dyn Session,
        history: &[Message],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<Vec<Message>, ConversationError> {
        let Some(context) = &self.context else {
            return Ok(model_view(history));
        };

        let result = context
            .strategy
            .fit(StrategyInput {
                messages: history,
                system_prompt,
                tools,
                counter: context.counter.as_ref(),
                max_tokens: context.max_tokens,
            })
            .await
            .map_err(ConversationError::Context)?;

        if let Some(update) = result.session_update {
            if let Err(e) = session.add_messages(&update.messages).await {
                warn!(
                    "Failed to persist {} update from {}: {e}",
                    update.messages.len(),
                    context.strategy.name()
                );
            }
        }
        debug!(
            "{} kept {} of {} message(s)",
            context.strategy.name(),
            result.messages.len(),
            history.len()
        );
        Ok(result.messages)
    }

    async fn call_model(
        &self,
        request: &[Message],
        tools: &[ToolDefinition],
        ctx: &TurnContext,
        mode: TurnMode<'_>,
    ) -> Result<ChatResponse, ConversationError> {
        match mode {
            TurnMode::Blocking => tokio::select! {
                () = ctx.cancel.cancelled() => Err(ConversationError::Cancelled),
                response = self.provider.chat(request, tools) => {
                    response.map_err(ConversationError::Provider)
                }
            },
            TurnMode::Streaming(events) => {
                let stream = self
                    .provider
                    .chat_stream(request, tools)
                    .await
                    .map_err(ConversationError::Provider)?;
                consume_stream(stream, events, &ctx.cancel).await
            }
        }
    }

    /// Assistant message for `response`. Tool calls are only included when
    /// they are about to be paired with results.
    fn assistant_message(&self, response: &ChatResponse, with_tool_calls: bool) -> Message {
        let mut parts = Vec::new();
        if let Some(thinking) = response.thinking.as_ref().filter(|t| !t.is_empty()) {
            parts.push(ContentPart::Thinking {
                text: thinking.clone(),
            });
        }
        if !response.content.is_empty() {
            parts.push(ContentPart::text(&response.content));
        }
        if with_tool_calls {
            parts.extend(response.tool_calls.iter().cloned().map(ContentPart::ToolCall));
        }
        let model = response.model.clone().unwrap_or_else(|| self.model_name());
        Message::new(Role::Assistant, parts).with_model(model)
    }

    /// Append to the session. Failures are fatal on the blocking path and
    /// only logged while streaming.
    async fn persist(
        &self,
        session: &dyn Session,
        messages: &[Message],
        mode: TurnMode<'_>,
    ) -> Result<(), ConversationError> {
        match session.add_messages(messages).await {
            Ok(()) => Ok(()),
            Err(e) => match mode {
                TurnMode::Blocking => Err(ConversationError::Session(e)),
                TurnMode::Streaming(_) => {
                    warn!("Failed to persist {} message(s): {e}", messages.len());
                    Ok(())
                }
            },
        }
    }

    fn spawn_memory_extraction(&self, owner: &str, session_id: &str, user_text: &str, reply: &str) {
        let Some(memory) = self.memory.clone().filter(MemoryHooks::auto_extract) else {
            return;
        };
        let owner = owner.to_string();
        let session_id = session_id.to_string();
        let user_text = user_text.to_string();
        let reply = reply.to_string();
        tokio::spawn(async move {
            if let Err(e) = memory
                .extract_and_store(&owner, &session_id, &user_text, &reply)
                .await
            {
                warn!("Memory extraction failed for {owner}: {e}");
            }
        });
    }
}
