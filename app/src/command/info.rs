use parley_config::Config;
use parley_session::SessionManager;
use tracing::info;

/// Prints the effective configuration and checks the database.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let settings = config.provider_settings(None)?;

        println!("=== parley Configuration ===\n");

        println!("Provider:");
        println!("  Kind: {:?}", settings.kind);
        println!("  API Key: {}", mask_secret(&settings.api_key));
        println!(
            "  Base URL: {}",
            settings
                .base_url
                .as_deref()
                .unwrap_or(settings.kind.default_base_url())
        );
        println!();

        let defaults = &config.agents.defaults;
        println!("Agent Defaults:");
        println!("  Model: {}", settings.model);
        println!("  Max Tokens: {}", defaults.max_tokens);
        println!("  Temperature: {}", defaults.temperature);
        println!("  System Prompt: {}", truncate(defaults.system_prompt(), 60));
        println!("  Max Iterations: {}", defaults.max_iterations);
        println!("  Auto Execute Tools: {}", defaults.auto_execute_tools);
        println!();

        println!("Database:");
        if config.database.enabled {
            println!("  URL: {}", mask_database_url(&config.database.url));
            info!("Testing database connection");
            match SessionManager::new(&config.database.url).await {
                Ok(manager) => {
                    println!("  Status: Connected");
                    let sessions = manager.list_sessions().await.unwrap_or_default();
                    println!("  Sessions: {}", sessions.len());
                }
                Err(e) => {
                    println!("  Status: Connection failed");
                    println!("  Error: {e}");
                }
            }
        } else {
            println!("  Disabled (in-memory sessions)");
        }
        println!();

        let memory = &config.memory;
        println!("Memory:");
        println!("  Enabled: {}", memory.enabled);
        println!("  Default Owner: {}", memory.default_owner);
        println!("  Auto Extract: {}", memory.auto_extract);
        println!("  Auto Dedup: {}", memory.auto_dedup);
        println!("  Search Limit: {}", memory.search_limit);
        println!("  Embeddings: {}", memory.embeddings);
        println!();

        println!("Context:");
        if config.context.enabled {
            let model = settings.kind.model_info(&settings.model);
            println!("  Strategy: {:?}", config.context.strategy);
            println!("  Token Budget: {}", config.context_budget(&model));
        } else {
            println!("  Disabled (full history is sent)");
        }
        println!();

        let retry = &config.retry;
        println!("Retry:");
        println!("  Max Attempts: {}", retry.max_attempts);
        println!(
            "  Delay: {}ms .. {}ms (jitter {})",
            retry.initial_delay_ms, retry.max_delay_ms, retry.jitter_factor
        );
        println!("  Retryable Statuses: {:?}", retry.retryable_statuses);

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, after_at)) = rest.split_once('@') else {
        return url.to_string();
    };
    let Some((username, _password)) = credentials.split_once(':') else {
        return url.to_string();
    };
    format!("{scheme}://{username}:***@{after_at}")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
