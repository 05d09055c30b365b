#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod chat_completions;
mod error;
pub mod retry;

use std::sync::Arc;

use parley_core::ModelInfo;
use serde::{Deserialize, Serialize};

pub use chat_completions::ChatCompletionsProvider;
pub use error::ProviderError;
pub use retry::{RetryPolicy, Retryable, parse_retry_after, retry_with_backoff};

/// Supported model vendors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Zhipu,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Zhipu => "glm-4-flash",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    #[must_use]
    pub const fn default_embedding_model(self) -> &'static str {
        match self {
            Self::Zhipu => "embedding-2",
            Self::OpenAi => "text-embedding-3-small",
        }
    }

    /// Best-known facts about `model`; unknown models get conservative values.
    #[must_use]
    pub fn model_info(self, model: &str) -> ModelInfo {
        let lower = model.to_lowercase();
        let context_window = match self {
            Self::Zhipu if lower.starts_with("glm-4") => 128_000,
            Self::OpenAi if lower.starts_with("gpt-4o") || lower.starts_with("gpt-4.1") => 128_000,
            Self::OpenAi if lower.starts_with('o') => 200_000,
            _ => 32_000,
        };
        ModelInfo {
            name: model.to_string(),
            context_window,
            default_max_tokens: 4096,
            supports_reasoning: lower.starts_with("glm-4.5")
                || lower.starts_with("glm-z1")
                || lower.starts_with("o1")
                || lower.starts_with("o3"),
            supports_attachments: lower.contains("4v") || lower.starts_with("gpt-4o"),
        }
    }
}

/// Everything needed to build a provider client.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub embedding_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub retry: RetryPolicy,
}

impl ProviderSettings {
    #[must_use]
    pub fn new(kind: ProviderKind, api_key: String) -> Self {
        Self {
            kind,
            api_key,
            base_url: None,
            model: kind.default_model().to_string(),
            embedding_model: None,
            max_tokens: None,
            temperature: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Build the client for `settings.kind`.
///
/// The returned client serves both chat and embeddings.
#[must_use]
pub fn build_provider(settings: &ProviderSettings) -> Arc<ChatCompletionsProvider> {
    let mut provider =
        ChatCompletionsProvider::new(settings.kind, settings.api_key.clone(), settings.model.clone())
            .with_retry_policy(settings.retry.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature);
    if let Some(base_url) = &settings.base_url {
        provider = provider.with_base_url(base_url.clone());
    }
    if let Some(model) = &settings.embedding_model {
        provider = provider.with_embedding_model(model.clone());
    }
    Arc::new(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::LLMProvider;

    #[test]
    fn kinds_deserialize_from_config_names() {
        let kind: ProviderKind =
            serde_json::from_str(r#""openai""#).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(kind, ProviderKind::OpenAi);
        let kind: ProviderKind =
            serde_json::from_str(r#""zhipu""#).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(kind, ProviderKind::Zhipu);
    }

    #[test]
    fn model_info_knows_glm_window() {
        let info = ProviderKind::Zhipu.model_info("glm-4-flash");
        assert_eq!(info.context_window, 128_000);
        assert!(!info.supports_reasoning);
        assert!(ProviderKind::Zhipu.model_info("glm-4.5").supports_reasoning);
        assert_eq!(ProviderKind::Zhipu.model_info("mystery").context_window, 32_000);
    }

    #[test]
    fn factory_uses_settings_model() {
        let mut settings = ProviderSettings::new(ProviderKind::OpenAi, "key".to_string());
        settings.model = "gpt-4o".to_string();
        let provider = build_provider(&settings);
        assert_eq!(provider.model_info().name, "gpt-4o");
        assert!(provider.model_info().supports_attachments);
    }
}
