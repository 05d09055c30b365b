//! Tool contracts, the registry, and the batch executor.

mod executor;
mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use executor::ToolExecutor;
pub use registry::ToolRegistry;

/// Tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    /// Run the tool. An `Err` is reported back to the model as an
    /// error-flagged result; it never aborts the turn.
    async fn execute(&self, input: serde_json::Value) -> anyhow::Result<String>;
}

/// Outcome of one tool call within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub name: String,
    /// Echo of the call's encoded input.
    pub input: String,
    pub output: String,
    pub is_error: bool,
}

/// Helper to build a JSON schema object.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn schema_object(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
