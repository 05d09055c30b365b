use async_trait::async_trait;
use parley_core::{
    ChatResponse, ContentPart, Embedder, FinishReason, LLMProvider, Message, ModelInfo, Role,
    ToolCall, ToolDefinition, Usage,
};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::ProviderKind;
use crate::error::ProviderError;
use crate::retry::{RetryPolicy, parse_retry_after, retry_with_backoff};

/// Client for `/chat/completions` style APIs (Zhipu, OpenAI and compatibles).
pub struct ChatCompletionsProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    retry: RetryPolicy,
    info: ModelInfo,
}

impl ChatCompletionsProvider {
    /// Convert f64 to f32 for embedding values
    #[expect(clippy::cast_possible_truncation, reason = "ML embeddings use f32")]
    const fn f64_to_f32(x: f64) -> f32 {
        x as f32
    }

    pub fn new(kind: ProviderKind, api_key: String, model: String) -> Self {
        info!("Creating {kind:?} provider for model {model}");
        let info = kind.model_info(&model);
        Self {
            client: Client::new(),
            api_key,
            base_url: kind.default_base_url().to_string(),
            embedding_model: kind.default_embedding_model().to_string(),
            model,
            max_tokens: None,
            temperature: None,
            retry: RetryPolicy::default(),
            info,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: String) -> Self {
        self.embedding_model = model;
        self
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": wire_messages(messages),
        });
        if !tools.is_empty() {
            body["tools"] = wire_tools(tools);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    /// Send a single request and decode the JSON body.
    async fn try_post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl LLMProvider for ChatCompletionsProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatResponse> {
        let body = self.request_body(messages, tools);
        info!(
            "Sending chat request: model={}, messages={}, tools={}",
            self.model,
            messages.len(),
            tools.len()
        );

        let raw = retry_with_backoff(&self.retry, || self.try_post("chat/completions", &body)).await?;
        let response = parse_response(&raw)?;

        debug!(
            "Received response: finish_reason={:?}, tool_calls={}",
            response.finish_reason,
            response.tool_calls.len()
        );
        Ok(response)
    }

    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }
}

#[async_trait]
impl Embedder for ChatCompletionsProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let body = json!({
            "model": self.embedding_model,
            "input": text,
        });
        let response = retry_with_backoff(&self.retry, || self.try_post("embeddings", &body)).await?;

        let embedding = response["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| ProviderError::InvalidResponse("missing embedding".to_string()))?
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(Self::f64_to_f32)
                    .ok_or_else(|| ProviderError::InvalidResponse("invalid embedding value".to_string()))
            })
            .collect::<Result<Vec<f32>, _>>()?;

        Ok(embedding)
    }
}

/// Translate stored messages into the wire format.
///
/// Summaries are sent as user messages, thinking is never sent back, and each
/// tool result becomes its own `tool` message.
pub(crate) fn wire_messages(messages: &[Message]) -> Vec<Value> {
    let mut wire = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::System => wire.push(json!({
                "role": "system",
                "content": message.text(),
            })),
            Role::User | Role::Summary => wire.push(json!({
                "role": "user",
                "content": user_content(message),
            })),
            Role::Assistant => {
                let text = message.text();
                let mut entry = json!({
                    "role": "assistant",
                    "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                });
                let calls: Vec<Value> = message
                    .tool_calls()
                    .into_iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": if call.input.trim().is_empty() { "{}" } else { call.input.as_str() },
                            }
                        })
                    })
                    .collect();
                if !calls.is_empty() {
                    entry["tool_calls"] = Value::Array(calls);
                }
                wire.push(entry);
            }
            Role::Tool => {
                for result in message.tool_result_parts() {
                    wire.push(json!({
                        "role": "tool",
                        "tool_call_id": result.tool_call_id,
                        "content": result.content,
                    }));
                }
            }
        }
    }
    wire
}

/// Plain text, or a parts array when images are attached.
fn user_content(message: &Message) -> Value {
    let has_images = message
        .parts
        .iter()
        .any(|p| matches!(p, ContentPart::ImageRef { .. }));
    if !has_images {
        return Value::String(message.text());
    }

    let parts = message
        .parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(json!({"type": "text", "text": text})),
            ContentPart::ImageRef { url, .. } => {
                Some(json!({"type": "image_url", "image_url": {"url": url}}))
            }
            _ => None,
        })
        .collect();
    Value::Array(parts)
}

pub(crate) fn wire_tools(tools: &[ToolDefinition]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect(),
    )
}

pub(crate) fn parse_response(raw: &Value) -> Result<ChatResponse, ProviderError> {
    let choice = raw["choices"]
        .get(0)
        .ok_or_else(|| ProviderError::InvalidResponse("missing choices".to_string()))?;
    let message = &choice["message"];

    let content = message["content"].as_str().unwrap_or_default().to_string();
    let thinking = message["reasoning_content"]
        .as_str()
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = &call["function"];
                    let name = function["name"].as_str()?;
                    let id = call["id"].as_str().unwrap_or(name);
                    let input = match &function["arguments"] {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    Some(ToolCall::new(id, name, input))
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut finish_reason = choice["finish_reason"]
        .as_str()
        .map_or(FinishReason::Stop, FinishReason::from_wire);
    if !tool_calls.is_empty() {
        finish_reason = FinishReason::ToolCalls;
    }

    let usage = raw["usage"].as_object().map(|u| {
        let field = |key: &str| u32::try_from(u[key].as_u64().unwrap_or(0)).unwrap_or(u32::MAX);
        Usage {
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
        }
    });

    if content.is_empty() && tool_calls.is_empty() && thinking.is_none() {
        return Err(ProviderError::InvalidResponse(
            "response has neither content nor tool calls".to_string(),
        ));
    }

    Ok(ChatResponse {
        content,
        thinking,
        tool_calls,
        usage,
        finish_reason,
        model: raw["model"].as_str().map(str::to_string),
    })
}
