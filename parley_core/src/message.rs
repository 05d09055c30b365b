//! Conversation messages and their content parts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    /// Durable conversation summary. Never sent to a model as-is: see
    /// [`Message::for_model`].
    Summary,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique within a turn.
    pub id: String,
    pub name: String,
    /// Encoded JSON arguments, kept opaque until execution.
    pub input: String,
    /// Set once streaming assembly of this call is done.
    #[serde(default)]
    pub finished: bool,
}

impl ToolCall {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: input.into(),
            finished: true,
        }
    }

    /// Decode the arguments. Blank input is treated as an empty object.
    pub fn parsed_input(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.input.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.input)
    }
}

/// The outcome of a tool call as recorded in history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolCall(ToolCall),
    ToolResult(ToolResultPart),
    ImageRef {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Binary {
        mime_type: String,
        data: Vec<u8>,
    },
}

impl ContentPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("{0} message has no content parts")]
    Empty(Role),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn text_parts(text: &str) -> Vec<ContentPart> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentPart::text(text)]
    }
}

impl Message {
    #[must_use]
    pub fn new(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            parts,
            model: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn system(text: impl AsRef<str>) -> Self {
        Self::new(Role::System, text_parts(text.as_ref()))
    }

    #[must_use]
    pub fn user(text: impl AsRef<str>) -> Self {
        Self::new(Role::User, text_parts(text.as_ref()))
    }

    #[must_use]
    pub fn assistant(text: impl AsRef<str>) -> Self {
        Self::new(Role::Assistant, text_parts(text.as_ref()))
    }

    #[must_use]
    pub fn summary(text: impl AsRef<str>) -> Self {
        Self::new(Role::Summary, text_parts(text.as_ref()))
    }

    /// Assistant message carrying text (possibly empty) followed by tool calls.
    #[must_use]
    pub fn assistant_with_tool_calls(text: &str, calls: Vec<ToolCall>) -> Self {
        let mut parts = text_parts(text);
        parts.extend(calls.into_iter().map(ContentPart::ToolCall));
        Self::new(Role::Assistant, parts)
    }

    #[must_use]
    pub fn tool_results(results: Vec<ToolResultPart>) -> Self {
        Self::new(
            Role::Tool,
            results.into_iter().map(ContentPart::ToolResult).collect(),
        )
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn validate(&self) -> Result<(), MessageError> {
        if self.is_empty() {
            return Err(MessageError::Empty(self.role));
        }
        Ok(())
    }

    /// Concatenated text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ContentPart::ToolCall(_)))
    }

    #[must_use]
    pub fn tool_result_parts(&self) -> Vec<&ToolResultPart> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Anything that is not a system message.
    #[must_use]
    pub fn is_conversational(&self) -> bool {
        self.role != Role::System
    }

    /// The copy of this message a model may receive: summaries become user
    /// messages, everything else is unchanged.
    #[must_use]
    pub fn for_model(&self) -> Self {
        let mut msg = self.clone();
        if msg.role == Role::Summary {
            msg.role = Role::User;
        }
        msg
    }

    /// Plain-text rendering used for summaries, prompts and token estimates.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            match part {
                ContentPart::Text { text } => out.push(text.clone()),
                ContentPart::Thinking { .. } => {}
                ContentPart::ToolCall(call) => {
                    out.push(format!("[tool call {}: {}]", call.name, call.input));
                }
                ContentPart::ToolResult(result) => {
                    out.push(format!("[tool result {}: {}]", result.name, result.content));
                }
                ContentPart::ImageRef { url, .. } => out.push(format!("[image {url}]")),
                ContentPart::Binary { mime_type, data } => {
                    out.push(format!("[binary {mime_type}, {} bytes]", data.len()));
                }
            }
        }
        out.join("\n")
    }
}
