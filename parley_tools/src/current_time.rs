use async_trait::async_trait;
use chrono::{Local, SecondsFormat, Utc};
use parley_core::tools::schema_object;
use parley_core::{Tool, ToolDefinition};
use serde_json::json;

/// Reports the current date and time.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &'static str {
        "current_time"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "current_time".into(),
            description: "Get the current date and time as an RFC 3339 timestamp.".into(),
            input_schema: schema_object(
                json!({
                    "timezone": {
                        "type": "string",
                        "enum": ["utc", "local"],
                        "description": "Clock to read (default: utc)"
                    }
                }),
                &[],
            ),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> anyhow::Result<String> {
        let timezone = input
            .get("timezone")
            .and_then(|v| v.as_str())
            .unwrap_or("utc");
        match timezone.to_ascii_lowercase().as_str() {
            "utc" => Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            "local" => Ok(Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)),
            other => anyhow::bail!("Unsupported timezone '{other}', expected 'utc' or 'local'"),
        }
    }
}
