use futures::StreamExt;
use parley_core::{ChatEvent, ChatResponse, ChatStream, FinishReason, ToolCall};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ConversationError;

/// Tool calls assembled from start / delta / stop events, in start order.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: Vec<ToolCall>,
}

impl ToolCallAccumulator {
    fn start(&mut self, id: &str, name: &str) {
        let mut call = ToolCall::new(id, name, "");
        call.finished = false;
        self.calls.push(call);
    }

    fn find(&mut self, id: &str) -> Option<&mut ToolCall> {
        self.calls.iter_mut().rev().find(|c| c.id == id)
    }

    fn delta(&mut self, id: &str, input: &str) {
        if let Some(call) = self.find(id) {
            call.input.push_str(input);
        }
    }

    fn stop(&mut self, id: &str) {
        if let Some(call) = self.find(id) {
            call.finished = true;
        }
    }

    fn finalize(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|mut call| {
                call.finished = true;
                call
            })
            .collect()
    }
}

/// Drain a provider stream into one response, forwarding deltas to `events`.
///
/// The provider's `Complete` event is authoritative when present; otherwise
/// the response is assembled from the deltas. Provider `Error` events and
/// stream errors fail the call. Cancellation is raced against every item.
pub async fn consume_stream(
    mut stream: ChatStream,
    events: &mpsc::Sender<ChatEvent>,
    cancel: &CancellationToken,
) -> Result<ChatResponse, ConversationError> {
    let mut content = String::new();
    let mut thinking = String::new();
    let mut tool_calls = ToolCallAccumulator::default();
    let mut completed: Option<ChatResponse> = None;

    loop {
        let item = tokio::select! {
            () = cancel.cancelled() => return Err(ConversationError::Cancelled),
            item = stream.next() => item,
        };
        let Some(item) = item else {
            break;
        };

        let event = item.map_err(ConversationError::Provider)?;
        match &event {
            ChatEvent::ContentDelta(delta) => content.push_str(delta),
            ChatEvent::ThinkingDelta(delta) => thinking.push_str(delta),
            ChatEvent::ToolUseStart { id, name } => tool_calls.start(id, name),
            ChatEvent::ToolUseDelta { id, input } => tool_calls.delta(id, input),
            ChatEvent::ToolUseStop { id } => tool_calls.stop(id),
            ChatEvent::Complete(response) => {
                completed = Some(response.clone());
                break;
            }
            ChatEvent::Error(message) => {
                return Err(ConversationError::Provider(anyhow::anyhow!(
                    message.clone()
                )));
            }
        }
        if events.send(event).await.is_err() {
            debug!("Stream receiver dropped, continuing turn without forwarding");
        }
    }

    let streamed_calls = tool_calls.finalize();
    let mut response = completed.unwrap_or_else(|| ChatResponse {
        finish_reason: if streamed_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        },
        ..ChatResponse::default()
    });
    if response.content.is_empty() {
        response.content = content;
    }
    if response.thinking.is_none() && !thinking.is_empty() {
        response.thinking = Some(thinking);
    }
    if response.tool_calls.is_empty() {
        response.tool_calls = streamed_calls;
    }
    Ok(response)
}
