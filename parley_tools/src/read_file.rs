use std::path::PathBuf;

use async_trait::async_trait;
use parley_core::tools::schema_object;
use parley_core::{Tool, ToolDefinition};
use serde_json::json;
use tracing::info;

use crate::resolve_tool_path;

const DEFAULT_LINE_LIMIT: usize = 2000;

/// Reads a text file, numbering the returned lines.
pub struct ReadFileTool {
    working_dir: PathBuf,
}

impl ReadFileTool {
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read the contents of a file at the given path. Returns the file content with line numbers.".into(),
            input_schema: schema_object(
                json!({
                    "path": {
                        "type": "string",
                        "description": "The file path to read"
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Line number to start reading from (1-based)"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of lines to read"
                    }
                }),
                &["path"],
            ),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> anyhow::Result<String> {
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            anyhow::bail!("Missing 'path' parameter");
        };
        let resolved = resolve_tool_path(&self.working_dir, path);
        info!("Reading file: {}", resolved.display());

        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read file: {e}"))?;

        let offset = input
            .get("offset")
            .and_then(serde_json::Value::as_u64)
            .map_or(0, |o| {
                usize::try_from(o).unwrap_or(usize::MAX).saturating_sub(1)
            });
        let limit = input
            .get("limit")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_LINE_LIMIT, |l| {
                usize::try_from(l).unwrap_or(usize::MAX)
            });

        let selected: Vec<String> = content
            .lines()
            .enumerate()
            .skip(offset)
            .take(limit)
            .map(|(i, line)| format!("{:>6}\t{line}", i + 1))
            .collect();
        Ok(selected.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, ReadFileTool) {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("temp dir: {e}"));
        std::fs::write(dir.path().join("notes.txt"), "line1\nline2\nline3\nline4\nline5")
            .unwrap_or_else(|e| panic!("write: {e}"));
        let tool = ReadFileTool::new(dir.path());
        (dir, tool)
    }

    #[tokio::test]
    async fn relative_paths_resolve_against_working_dir() {
        let (_dir, tool) = fixture();
        let output = tool
            .execute(json!({"path": "notes.txt"}))
            .await
            .unwrap_or_else(|e| panic!("read failed: {e}"));
        assert!(output.starts_with("     1\tline1"));
        assert!(output.ends_with("     5\tline5"));
    }

    #[tokio::test]
    async fn offset_and_limit_select_a_window() {
        let (_dir, tool) = fixture();
        let output = tool
            .execute(json!({"path": "notes.txt", "offset": 2, "limit": 2}))
            .await
            .unwrap_or_else(|e| panic!("read failed: {e}"));
        assert_eq!(output, "     2\tline2\n     3\tline3");
    }

    #[tokio::test]
    async fn offset_past_end_is_empty() {
        let (_dir, tool) = fixture();
        let output = tool
            .execute(json!({"path": "notes.txt", "offset": 50}))
            .await
            .unwrap_or_else(|e| panic!("read failed: {e}"));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let (_dir, tool) = fixture();
        let err = tool.execute(json!({"path": "absent.txt"})).await.err();
        assert!(err.is_some_and(|e| e.to_string().contains("Failed to read file")));
    }

    #[tokio::test]
    async fn missing_path_is_rejected() {
        let (_dir, tool) = fixture();
        let err = tool.execute(json!({})).await.err();
        assert!(err.is_some_and(|e| e.to_string().contains("Missing 'path'")));
    }
}
