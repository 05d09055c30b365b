use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parley_core::tools::schema_object;
use parley_core::{Tool, ToolDefinition};
use serde_json::json;
use tracing::info;

use crate::command_runner::{build_command, shell_command};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Runs a shell command in a fixed working directory.
pub struct BashTool {
    working_dir: PathBuf,
}

impl BashTool {
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

fn truncate_output(mut text: String) -> String {
    if let Some((cutoff, _)) = text.char_indices().nth(MAX_OUTPUT_CHARS) {
        text.truncate(cutoff);
        text.push_str("\n... (output truncated)");
    }
    text
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "bash".into(),
            description: "Execute a shell command and return its output. Use for running scripts, inspecting the system, or other command-line work.".into(),
            input_schema: schema_object(
                json!({
                    "command": {
                        "type": "string",
                        "description": "The command to execute"
                    },
                    "timeout_secs": {
                        "type": "integer",
                        "description": "Timeout in seconds (default: 120)"
                    }
                }),
                &["command"],
            ),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> anyhow::Result<String> {
        let Some(command) = input.get("command").and_then(|v| v.as_str()) else {
            anyhow::bail!("Missing 'command' parameter");
        };
        let timeout_secs = input
            .get("timeout_secs")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        tokio::fs::create_dir_all(&self.working_dir)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create working directory {}: {e}",
                    self.working_dir.display()
                )
            })?;

        info!("Executing bash: {command}");
        let spec = shell_command(command);
        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            build_command(&spec, &self.working_dir).output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Command timed out after {timeout_secs} seconds"))?
        .map_err(|e| anyhow::anyhow!("Failed to execute command: {e}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut text = stdout.into_owned();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("STDERR:\n");
            text.push_str(&stderr);
        }
        if text.is_empty() {
            text = format!("Command completed with exit code {exit_code}");
        }
        let text = truncate_output(text);

        if exit_code == 0 {
            Ok(text)
        } else {
            anyhow::bail!("Exit code {exit_code}\n{text}")
        }
    }
}
