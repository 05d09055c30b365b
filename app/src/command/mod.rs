//! Static strategy pattern for CLI commands.
//!
//! Each command is its own type implementing [`CommandStrategy`], with its
//! own input type, dispatched statically from `main`.

use std::sync::Arc;

use parley_config::Config;
use parley_conversation::{
    ContextOptions, ConversationController, ConversationControllerBuilder, MemoryOptions,
};
use parley_core::{Embedder, LLMProvider, MemoryStore, Session, ToolRegistry};
use parley_memory::{InMemoryStore, MemoryManager};
use parley_providers::build_provider;
use parley_session::{InMemorySession, SessionManager};
use sea_orm::Database;
use tracing::info;

mod chat;
mod info;
mod init;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use version::VersionStrategy;

/// Contract for all command strategies.
///
/// Each strategy defines its own input type, so parameters are passed
/// without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Where session histories live for this run.
pub enum SessionStore {
    Database(SessionManager),
    Memory,
}

impl SessionStore {
    pub fn open(&self, key: &str) -> Arc<dyn Session> {
        match self {
            Self::Database(manager) => Arc::new(manager.session(key)),
            Self::Memory => Arc::new(InMemorySession::new(key)),
        }
    }

    pub async fn clear(&self, key: &str) -> anyhow::Result<()> {
        match self {
            Self::Database(manager) => manager.clear_session(key).await,
            Self::Memory => Ok(()),
        }
    }
}

/// Everything a chat run needs, assembled from the config file.
pub struct Runtime {
    pub config: Config,
    pub controller: ConversationController,
    pub sessions: SessionStore,
}

/// Options that override the config file for one run.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions<'a> {
    pub model: Option<&'a str>,
    pub tools: bool,
}

pub async fn build_runtime(options: RuntimeOptions<'_>) -> anyhow::Result<Runtime> {
    let config = Config::load()?;
    let settings = config.provider_settings(options.model)?;
    let client = build_provider(&settings);
    let provider: Arc<dyn LLMProvider> = client.clone();
    info!("Using {:?} model {}", settings.kind, settings.model);

    let (sessions, memory_store) = if config.database.enabled {
        Config::ensure_config_dir()?;
        info!("Connecting to database");
        let db = Database::connect(config.database.url.as_str()).await?;
        let sessions = SessionManager::from_connection(db.clone()).await?;
        let store = if config.memory.enabled {
            let mut manager = MemoryManager::from_connection(db).await?;
            if config.memory.embeddings {
                let embedder: Arc<dyn Embedder> = client;
                manager = manager.with_embedder(embedder);
            }
            Some(Arc::new(manager) as Arc<dyn MemoryStore>)
        } else {
            None
        };
        (SessionStore::Database(sessions), store)
    } else {
        info!("Database disabled, keeping sessions and memories in memory");
        let store = config
            .memory
            .enabled
            .then(|| Arc::new(InMemoryStore::new()) as Arc<dyn MemoryStore>);
        (SessionStore::Memory, store)
    };

    let defaults = &config.agents.defaults;
    let tools = if options.tools {
        parley_tools::default_tools(&std::env::current_dir()?)
    } else {
        ToolRegistry::new()
    };

    let mut builder = ConversationControllerBuilder::new(provider.clone())
        .with_system_prompt(defaults.system_prompt())
        .with_tools(tools)
        .with_max_iterations(defaults.max_iterations)
        .with_auto_execute_tools(defaults.auto_execute_tools);

    if let Some(store) = memory_store {
        let memory = &config.memory;
        builder = builder
            .with_memory(
                MemoryOptions::new(store)
                    .with_auto_extract(memory.auto_extract)
                    .with_auto_dedup(memory.auto_dedup)
                    .with_search_limit(memory.search_limit),
            )
            .with_default_owner(memory.default_owner.clone());
    }

    if config.context.enabled {
        let strategy = config.context.strategy.build(provider.clone());
        let budget = config.context_budget(&provider.model_info());
        info!("Context strategy {} with a budget of {budget} tokens", strategy.name());
        builder = builder.with_context(ContextOptions::new(strategy, budget));
    }

    let controller = builder.build()?;
    Ok(Runtime {
        config,
        controller,
        sessions,
    })
}
