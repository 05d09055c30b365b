use std::path::{Path, PathBuf};
use std::time::Duration;

use parley_context::StrategyConfig;
use parley_core::ModelInfo;
use parley_core::util::DEFAULT_SYSTEM_PROMPT_WITH_MEMORY;
use parley_providers::{ProviderKind, ProviderSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CONFIG_DIR: &str = "parley";
const CONFIG_FILE: &str = "config.json";
const API_KEY_PLACEHOLDER: &str = "your-api-key-here";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDefaults {
    /// Falls back to the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "AgentDefaults::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "AgentDefaults::default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default = "AgentDefaults::default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_true")]
    pub auto_execute_tools: bool,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: Self::default_max_tokens(),
            temperature: Self::default_temperature(),
            system_prompt: None,
            max_iterations: Self::default_max_iterations(),
            auto_execute_tools: true,
        }
    }
}

impl AgentDefaults {
    const fn default_max_tokens() -> u32 {
        4096
    }

    const fn default_temperature() -> f32 {
        0.7
    }

    const fn default_max_iterations() -> usize {
        10
    }

    /// Configured prompt, or the stock one.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT_WITH_MEMORY)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    /// Which vendor the app talks to.
    #[serde(default)]
    pub default: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zhipu: Option<ProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderConfig>,
}

impl ProvidersConfig {
    #[must_use]
    pub const fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        match kind {
            ProviderKind::Zhipu => self.zhipu.as_ref(),
            ProviderKind::OpenAi => self.openai.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Sessions and memories live in process memory when disabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "DatabaseConfig::default_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: Self::default_url(),
        }
    }
}

impl DatabaseConfig {
    fn default_url() -> String {
        dirs::home_dir().map_or_else(
            || "sqlite://parley.db?mode=rwc".to_string(),
            |home| {
                format!(
                    "sqlite://{}?mode=rwc",
                    home.join(CONFIG_DIR).join("parley.db").display()
                )
            },
        )
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Owner used when a turn does not name one.
    #[serde(default = "MemoryConfig::default_owner")]
    pub default_owner: String,
    #[serde(default = "default_true")]
    pub auto_extract: bool,
    #[serde(default = "default_true")]
    pub auto_dedup: bool,
    #[serde(default = "MemoryConfig::default_search_limit")]
    pub search_limit: usize,
    /// Rank memories with embeddings in addition to keywords.
    #[serde(default)]
    pub embeddings: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_owner: Self::default_owner(),
            auto_extract: true,
            auto_dedup: true,
            search_limit: Self::default_search_limit(),
            embeddings: false,
        }
    }
}

impl MemoryConfig {
    fn default_owner() -> String {
        "default".to_string()
    }

    const fn default_search_limit() -> usize {
        5
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Token budget; derived from the model's context window when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tokens: None,
            strategy: StrategyConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryConfig::default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "RetryConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "RetryConfig::default_jitter_factor")]
    pub jitter_factor: f64,
    #[serde(default = "RetryConfig::default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_delay_ms: Self::default_initial_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
            jitter_factor: Self::default_jitter_factor(),
            retryable_statuses: Self::default_retryable_statuses(),
        }
    }
}

impl RetryConfig {
    fn default_max_attempts() -> u32 {
        RetryPolicy::default().max_attempts
    }

    const fn default_initial_delay_ms() -> u64 {
        500
    }

    const fn default_max_delay_ms() -> u64 {
        8_000
    }

    fn default_jitter_factor() -> f64 {
        RetryPolicy::default().jitter_factor
    }

    fn default_retryable_statuses() -> Vec<u16> {
        RetryPolicy::default().retryable_statuses
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_factor: self.jitter_factor,
            retryable_statuses: self.retryable_statuses.clone(),
        }
    }
}

const fn default_true() -> bool {
    true
}

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'parley init' to create config.",
                config_path.display()
            );
        }
        Self::load_from(&config_path)
    }

    /// Parse and validate the file at `path`.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    /// Write the template to `~/parley/config.json`.
    pub fn create_config() -> anyhow::Result<PathBuf> {
        let config_dir = Self::ensure_config_dir()?;
        Self::create_config_in(&config_dir)
    }

    /// Write the template into `dir`, refusing to overwrite an existing file.
    pub fn create_config_in(dir: &Path) -> anyhow::Result<PathBuf> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }
        std::fs::write(&config_path, Self::template())?;
        Ok(config_path)
    }

    #[must_use]
    pub fn template() -> String {
        format!(
            r#"{{
  "agents": {{
    "defaults": {{
      "model": "glm-4-flash",
      "max_tokens": 4096,
      "temperature": 0.7,
      "system_prompt": "{DEFAULT_SYSTEM_PROMPT_WITH_MEMORY}",
      "max_iterations": 10,
      "auto_execute_tools": true
    }}
  }},
  "providers": {{
    "default": "zhipu",
    "zhipu": {{
      "api_key": "{API_KEY_PLACEHOLDER}"
    }}
  }},
  "database": {{
    "enabled": true,
    "url": {url}
  }},
  "memory": {{
    "enabled": true,
    "default_owner": "default",
    "auto_extract": true,
    "auto_dedup": true,
    "search_limit": 5,
    "embeddings": false
  }},
  "context": {{
    "enabled": true,
    "strategy": {{
      "kind": "sliding_window",
      "keep_last": 10
    }}
  }},
  "retry": {{
    "max_attempts": 4,
    "initial_delay_ms": 500,
    "max_delay_ms": 8000,
    "jitter_factor": 0.25
  }}
}}
"#,
            url = serde_json::Value::from(DatabaseConfig::default_url())
        )
    }

    /// Reject settings the app cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let kind = self.providers.default;
        let Some(provider) = self.providers.get(kind) else {
            anyhow::bail!("No settings for the default provider {kind:?} under 'providers'");
        };
        let api_key = provider.api_key.trim();
        if api_key.is_empty() || api_key == API_KEY_PLACEHOLDER {
            anyhow::bail!("Set an API key for provider {kind:?} in the config file");
        }

        let defaults = &self.agents.defaults;
        if defaults.max_tokens == 0 {
            anyhow::bail!("agents.defaults.max_tokens must be greater than zero");
        }
        if !(0.0..=2.0).contains(&defaults.temperature) {
            anyhow::bail!("agents.defaults.temperature must be between 0 and 2");
        }
        if self.memory.enabled && self.memory.search_limit == 0 {
            anyhow::bail!("memory.search_limit must be greater than zero");
        }
        if self.context.max_tokens == Some(0) {
            anyhow::bail!("context.max_tokens must be greater than zero");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            anyhow::bail!("retry.jitter_factor must be between 0 and 1");
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            anyhow::bail!("retry.initial_delay_ms must not exceed retry.max_delay_ms");
        }
        Ok(())
    }

    /// Client settings for the default provider. `model` overrides the
    /// configured one.
    pub fn provider_settings(&self, model: Option<&str>) -> anyhow::Result<ProviderSettings> {
        let kind = self.providers.default;
        let provider = self
            .providers
            .get(kind)
            .ok_or_else(|| anyhow::anyhow!("No settings for provider {kind:?}"))?;

        let mut settings = ProviderSettings::new(kind, provider.api_key.clone());
        if let Some(model) = model.or(self.agents.defaults.model.as_deref()) {
            settings.model = model.to_string();
        }
        settings.base_url.clone_from(&provider.base_url);
        settings.embedding_model.clone_from(&provider.embedding_model);
        settings.max_tokens = Some(self.agents.defaults.max_tokens);
        settings.temperature = Some(self.agents.defaults.temperature);
        settings.retry = self.retry.policy();
        Ok(settings)
    }

    /// Token budget for context fitting: the configured one, or whatever the
    /// model's window leaves after room for the reply.
    #[must_use]
    pub fn context_budget(&self, model: &ModelInfo) -> usize {
        self.context.max_tokens.unwrap_or_else(|| {
            let reply = usize::try_from(self.agents.defaults.max_tokens).unwrap_or(usize::MAX);
            model.context_window.saturating_sub(reply).max(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        serde_json::from_str(r#"{"providers": {"zhipu": {"api_key": "sk-test"}}}"#)
            .unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    #[test]
    fn sections_default_when_missing() {
        let config = minimal();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.default, ProviderKind::Zhipu);
        assert_eq!(config.agents.defaults.max_iterations, 10);
        assert!(config.agents.defaults.auto_execute_tools);
        assert!(config.database.enabled);
        assert!(config.database.url.starts_with("sqlite://"));
        assert_eq!(config.memory.search_limit, 5);
        assert_eq!(config.memory.default_owner, "default");
        assert_eq!(config.context.strategy, StrategyConfig::default());
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn template_parses_but_needs_a_real_key() {
        let config: Config = serde_json::from_str(&Config::template())
            .unwrap_or_else(|e| panic!("template does not parse: {e}"));
        let err = config.validate().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("API key"));

        let mut config = config;
        if let Some(zhipu) = config.providers.zhipu.as_mut() {
            zhipu.api_key = "sk-real".to_string();
        }
        assert!(config.validate().is_ok());
        assert_eq!(config.agents.defaults.model.as_deref(), Some("glm-4-flash"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = minimal();
        config.providers.default = ProviderKind::OpenAi;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.context.max_tokens = Some(0);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.memory.search_limit = 0;
        assert!(config.validate().is_err());
        config.memory.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn provider_settings_follow_config_and_override() {
        let mut config = minimal();
        config.agents.defaults.model = Some("glm-4-plus".to_string());
        config.retry.max_attempts = 2;

        let settings = config
            .provider_settings(None)
            .unwrap_or_else(|e| panic!("settings failed: {e}"));
        assert_eq!(settings.model, "glm-4-plus");
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.max_tokens, Some(4096));
        assert_eq!(settings.retry.max_attempts, 2);

        let settings = config
            .provider_settings(Some("glm-4-air"))
            .unwrap_or_else(|e| panic!("settings failed: {e}"));
        assert_eq!(settings.model, "glm-4-air");
    }

    #[test]
    fn context_budget_leaves_room_for_reply() {
        let mut config = minimal();
        let info = ProviderKind::Zhipu.model_info("glm-4-flash");
        assert_eq!(config.context_budget(&info), 128_000 - 4096);
        config.context.max_tokens = Some(2000);
        assert_eq!(config.context_budget(&info), 2000);
    }

    #[test]
    fn create_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("temp dir: {e}"));
        let path = Config::create_config_in(dir.path())
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        assert!(path.exists());
        assert!(Config::create_config_in(dir.path()).is_err());

        // The untouched template still carries the placeholder key.
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("temp dir: {e}"));
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap_or_else(|e| panic!("write: {e}"));
        let err = Config::load_from(&path).err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.starts_with("Invalid config at"));
    }
}
