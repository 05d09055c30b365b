use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ToolExecutionResult, ToolRegistry};
use crate::message::{Message, ToolCall, ToolResultPart};

/// Runs the tool calls of one model turn against a registry.
///
/// Calls run one at a time in the order the model issued them, so results
/// always line up with their calls.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every call, producing exactly one result per call in call
    /// order. Failures of any kind become error-flagged results. Once
    /// `cancel` fires no further tool is started.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Vec<ToolExecutionResult> {
        info!("Executing {} tool call(s)", calls.len());
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if cancel.is_cancelled() {
                warn!("Skipping tool {} ({}): turn canceled", call.name, call.id);
                results.push(error_result(call, "tool execution canceled".to_string()));
                continue;
            }
            results.push(self.execute_one(call).await);
        }
        results
    }

    async fn execute_one(&self, call: &ToolCall) -> ToolExecutionResult {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!("Model requested unknown tool: {}", call.name);
            return error_result(call, format!("tool not found: {}", call.name));
        };

        let input = match call.parsed_input() {
            Ok(input) => input,
            Err(e) => {
                warn!("Invalid input for tool {}: {e}", call.name);
                return error_result(call, format!("invalid tool input: {e}"));
            }
        };

        debug!("Running tool {} ({})", call.name, call.id);
        match tool.execute(input).await {
            Ok(output) => ToolExecutionResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
                output,
                is_error: false,
            },
            Err(e) => {
                warn!("Tool {} failed: {e}", call.name);
                error_result(call, e.to_string())
            }
        }
    }

    /// The `tool`-role message recording a batch's results.
    #[must_use]
    pub fn results_message(results: &[ToolExecutionResult]) -> Message {
        Message::tool_results(
            results
                .iter()
                .map(|r| ToolResultPart {
                    tool_call_id: r.tool_call_id.clone(),
                    name: r.name.clone(),
                    content: r.output.clone(),
                    is_error: r.is_error,
                })
                .collect(),
        )
    }
}

fn error_result(call: &ToolCall, output: String) -> ToolExecutionResult {
    ToolExecutionResult {
        tool_call_id: call.id.clone(),
        name: call.name.clone(),
        input: call.input.clone(),
        output,
        is_error: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentPart;
    use crate::testing::{EchoTool, FailingTool};

    fn executor() -> ToolExecutor {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(EchoTool))
            .with_tool(Arc::new(FailingTool));
        ToolExecutor::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn results_follow_call_order() {
        let calls = vec![
            ToolCall::new("c1", "echo", r#"{"v":1}"#),
            ToolCall::new("c2", "missing", "{}"),
            ToolCall::new("c3", "fail", "{}"),
            ToolCall::new("c4", "echo", r#"{"v":4}"#),
        ];
        let results = executor()
            .execute_batch(&calls, &CancellationToken::new())
            .await;

        let ids: Vec<&str> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c3", "c4"]);
        assert!(!results[0].is_error);
        assert_eq!(results[0].output, r#"{"v":1}"#);
        assert!(results[1].is_error);
        assert_eq!(results[1].output, "tool not found: missing");
        assert!(results[2].is_error);
        assert!(results[2].output.contains("boom"));
        assert!(!results[3].is_error);
    }

    #[tokio::test]
    async fn malformed_input_is_an_error_result() {
        let calls = vec![ToolCall::new("c1", "echo", "{oops")];
        let results = executor()
            .execute_batch(&calls, &CancellationToken::new())
            .await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_error);
        assert!(results[0].output.starts_with("invalid tool input"));
        assert_eq!(results[0].input, "{oops");
    }

    #[tokio::test]
    async fn canceled_batch_still_answers_every_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = vec![
            ToolCall::new("c1", "echo", "{}"),
            ToolCall::new("c2", "echo", "{}"),
        ];
        let results = executor().execute_batch(&calls, &cancel).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_error));
        assert_eq!(results[1].output, "tool execution canceled");
    }

    #[test]
    fn results_message_has_one_part_per_result() {
        let results = vec![
            ToolExecutionResult {
                tool_call_id: "a".to_string(),
                name: "echo".to_string(),
                input: "{}".to_string(),
                output: "ok".to_string(),
                is_error: false,
            },
            ToolExecutionResult {
                tool_call_id: "b".to_string(),
                name: "fail".to_string(),
                input: "{}".to_string(),
                output: "boom".to_string(),
                is_error: true,
            },
        ];
        let msg = ToolExecutor::results_message(&results);
        assert_eq!(msg.parts.len(), 2);
        assert!(matches!(
            &msg.parts[1],
            ContentPart::ToolResult(part) if part.is_error && part.tool_call_id == "b"
        ));
    }
}
