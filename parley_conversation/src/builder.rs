use std::sync::Arc;

use parley_context::ContextStrategy;
use parley_core::{HeuristicTokenCounter, LLMProvider, TokenCounter, ToolExecutor, ToolRegistry};

use crate::controller::ConversationController;
use crate::error::ConfigError;
use crate::memory::{MemoryHooks, MemoryOptions};

/// Context fitting applied before the first model call of a turn.
#[derive(Clone)]
pub struct ContextOptions {
    pub strategy: Arc<dyn ContextStrategy>,
    pub max_tokens: usize,
    pub counter: Arc<dyn TokenCounter>,
}

impl ContextOptions {
    #[must_use]
    pub fn new(strategy: Arc<dyn ContextStrategy>, max_tokens: usize) -> Self {
        Self {
            strategy,
            max_tokens,
            counter: Arc::new(HeuristicTokenCounter::default()),
        }
    }

    #[must_use]
    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }
}

pub struct ConversationControllerBuilder {
    provider: Arc<dyn LLMProvider>,
    system_prompt: Option<String>,
    tools: ToolRegistry,
    max_iterations: usize,
    auto_execute_tools: bool,
    memory: Option<MemoryOptions>,
    default_owner: Option<String>,
    context: Option<ContextOptions>,
}

impl ConversationControllerBuilder {
    pub const DEFAULT_MAX_ITERATIONS: usize = 10;

    #[must_use]
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            system_prompt: None,
            tools: ToolRegistry::new(),
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            auto_execute_tools: true,
            memory: None,
            default_owner: None,
            context: None,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Tool-execution rounds allowed per turn before pending calls are
    /// handed back to the caller.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub const fn with_auto_execute_tools(mut self, auto_execute: bool) -> Self {
        self.auto_execute_tools = auto_execute;
        self
    }

    #[must_use]
    pub fn with_memory(mut self, memory: MemoryOptions) -> Self {
        self.memory = Some(memory);
        self
    }

    #[must_use]
    pub fn with_default_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.default_owner = Some(owner_id.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ContextOptions) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<ConversationController, ConfigError> {
        if self.context.as_ref().is_some_and(|c| c.max_tokens == 0) {
            return Err(ConfigError::ZeroTokenBudget);
        }
        if self.memory.as_ref().is_some_and(|m| m.search_limit == 0) {
            return Err(ConfigError::ZeroSearchLimit);
        }

        let memory = self
            .memory
            .map(|options| MemoryHooks::new(options, &self.provider));
        let tools = Arc::new(self.tools);

        Ok(ConversationController {
            provider: self.provider,
            system_prompt: self.system_prompt,
            executor: ToolExecutor::new(tools.clone()),
            tools,
            max_iterations: self.max_iterations,
            auto_execute_tools: self.auto_execute_tools,
            memory,
            default_owner: self.default_owner,
            context: self.context,
        })
    }
}
