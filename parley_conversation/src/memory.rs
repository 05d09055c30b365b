use std::sync::Arc;

use parley_core::{LLMProvider, MemoryEntry, MemoryStore, Metadata};
use parley_memory::{FactExtractor, MemoryReconciler};
use serde_json::json;
use tracing::{debug, info, warn};

/// How the controller uses long-term memory.
#[derive(Clone)]
pub struct MemoryOptions {
    pub store: Arc<dyn MemoryStore>,
    /// Extract facts from every finished turn.
    pub auto_extract: bool,
    /// Reconcile extracted facts against existing memories instead of
    /// storing them directly.
    pub auto_dedup: bool,
    /// Model used for extraction and reconciliation; the chat model otherwise.
    pub reconcile_provider: Option<Arc<dyn LLMProvider>>,
    pub search_limit: usize,
}

impl MemoryOptions {
    pub const DEFAULT_SEARCH_LIMIT: usize = 5;

    #[must_use]
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            auto_extract: true,
            auto_dedup: true,
            reconcile_provider: None,
            search_limit: Self::DEFAULT_SEARCH_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_auto_extract(mut self, auto_extract: bool) -> Self {
        self.auto_extract = auto_extract;
        self
    }

    #[must_use]
    pub const fn with_auto_dedup(mut self, auto_dedup: bool) -> Self {
        self.auto_dedup = auto_dedup;
        self
    }

    #[must_use]
    pub fn with_reconcile_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.reconcile_provider = Some(provider);
        self
    }

    #[must_use]
    pub const fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }
}

/// Memory collaborators resolved at build time.
#[derive(Clone)]
pub(crate) struct MemoryHooks {
    store: Arc<dyn MemoryStore>,
    auto_extract: bool,
    auto_dedup: bool,
    search_limit: usize,
    extractor: Arc<FactExtractor>,
    reconciler: Arc<MemoryReconciler>,
}

impl MemoryHooks {
    pub(crate) fn new(options: MemoryOptions, chat_provider: &Arc<dyn LLMProvider>) -> Self {
        let provider = options
            .reconcile_provider
            .unwrap_or_else(|| chat_provider.clone());
        Self {
            store: options.store,
            auto_extract: options.auto_extract,
            auto_dedup: options.auto_dedup,
            search_limit: options.search_limit,
            extractor: Arc::new(FactExtractor::new(provider.clone())),
            reconciler: Arc::new(
                MemoryReconciler::new(provider).with_search_limit(options.search_limit),
            ),
        }
    }

    pub(crate) const fn auto_extract(&self) -> bool {
        self.auto_extract
    }

    /// Memories relevant to `query`; failures yield nothing.
    pub(crate) async fn relevant(&self, owner_id: &str, query: &str) -> Vec<MemoryEntry> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self.store.search(owner_id, query, self.search_limit).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Memory search failed, continuing without memories: {e}");
                Vec::new()
            }
        }
    }

    /// Extract facts from one exchange and store or reconcile each of them.
    pub(crate) async fn extract_and_store(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
        reply: &str,
    ) -> anyhow::Result<()> {
        let facts = self.extractor.extract(owner_id, user_text, reply).await?;
        if facts.is_empty() {
            debug!("No facts to remember for {owner_id}");
            return Ok(());
        }

        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("conversation"));
        metadata.insert("session_id".to_string(), json!(session_id));

        for fact in &facts {
            let result = if self.auto_dedup {
                self.reconciler
                    .reconcile(self.store.as_ref(), owner_id, fact, &metadata)
                    .await
                    .map(|_| ())
            } else {
                self.store
                    .store(owner_id, fact, metadata.clone())
                    .await
                    .map(|_| ())
            };
            if let Err(e) = result {
                warn!("Failed to remember fact for {owner_id}: {e}");
            }
        }

        info!("Processed {} fact(s) for {owner_id}", facts.len());
        Ok(())
    }
}

/// The configured prompt extended with a `# Relevant Memories` block.
pub(crate) fn with_memories(base: Option<&str>, memories: &[MemoryEntry]) -> Option<String> {
    if memories.is_empty() {
        return base.map(str::to_string);
    }

    let lines: Vec<String> = memories
        .iter()
        .map(|memory| format!("- {}", memory.content))
        .collect();
    let block = format!("# Relevant Memories\n{}", lines.join("\n"))
        .trim_end()
        .to_string();

    Some(match base {
        Some(base) if !base.is_empty() => format!("{base}\n\n{block}"),
        _ => block,
    })
}
