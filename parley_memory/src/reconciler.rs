use std::sync::Arc;

use parley_core::{LLMProvider, MemoryEntry, MemoryStore, Message, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::json::first_json_object;

pub const DEDUP_SYSTEM_PROMPT: &str = r#"You manage a long-term memory of facts about a user. You are given a new fact and the existing memories that look related to it. For the new fact decide one of:
- ADD: it is new information. Use a new entry without an id.
- UPDATE: it refines or corrects an existing memory. Give that memory's id and the merged text.
- DELETE: it contradicts an existing memory that is no longer true. Give that memory's id.
- NONE: it is already known. Give the id of the memory that covers it.
Respond with a single JSON object and nothing else:
{"memory": [{"id": "<existing id or empty>", "event": "ADD|UPDATE|DELETE|NONE", "text": "<memory text>"}]}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DedupEvent {
    Add,
    Update,
    Delete,
    None,
}

impl DedupEvent {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ADD" => Some(Self::Add),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "NONE" | "NOOP" => Some(Self::None),
            _ => None,
        }
    }
}

/// One action the model wants applied to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupDecision {
    pub event: DedupEvent,
    /// Target memory for UPDATE / DELETE / NONE.
    pub id: Option<String>,
    pub text: String,
}

impl DedupDecision {
    #[must_use]
    pub fn add(text: &str) -> Self {
        Self {
            event: DedupEvent::Add,
            id: None,
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// UPDATE / DELETE decisions dropped for lack of a usable id.
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    memory: Vec<WireDecision>,
}

#[derive(Debug, Deserialize)]
struct WireDecision {
    #[serde(default)]
    id: Value,
    event: String,
    #[serde(default)]
    text: Option<String>,
}

impl WireDecision {
    fn id(&self) -> Option<String> {
        let id = match &self.id {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!id.is_empty()).then_some(id)
    }
}

/// Decides how a new fact relates to what is already stored, and applies
/// the decision.
pub struct MemoryReconciler {
    provider: Arc<dyn LLMProvider>,
    search_limit: usize,
}

impl MemoryReconciler {
    pub const DEFAULT_SEARCH_LIMIT: usize = 5;

    #[must_use]
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            search_limit: Self::DEFAULT_SEARCH_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    /// Ask the model what to do with `fact` given `existing` memories.
    ///
    /// Never fails: without existing memories, or when the model call or its
    /// output is unusable, the fact is simply added.
    pub async fn decide(&self, fact: &str, existing: &[MemoryEntry]) -> Vec<DedupDecision> {
        if existing.is_empty() {
            return vec![DedupDecision::add(fact)];
        }

        let listing: Vec<String> = existing
            .iter()
            .map(|entry| format!("- [{}] {}", entry.id, entry.content))
            .collect();
        let request = vec![
            Message::system(DEDUP_SYSTEM_PROMPT),
            Message::user(format!(
                "Existing memories:\n{}\n\nNew fact: {fact}",
                listing.join("\n")
            )),
        ];

        let response = match self.provider.chat(&request, &[]).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Dedup model call failed, adding fact as new: {e}");
                return vec![DedupDecision::add(fact)];
            }
        };

        let Some(parsed) = first_json_object::<WireResponse>(&response.content) else {
            warn!("Dedup response was not valid JSON, adding fact as new");
            return vec![DedupDecision::add(fact)];
        };

        parsed
            .memory
            .into_iter()
            .filter_map(|wire| {
                let Some(event) = DedupEvent::parse(&wire.event) else {
                    warn!("Ignoring unknown dedup event: {}", wire.event);
                    return None;
                };
                let text = wire
                    .text
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map_or_else(
                        || if event == DedupEvent::Add { fact.to_string() } else { String::new() },
                        str::to_string,
                    );
                Some(DedupDecision {
                    event,
                    id: wire.id(),
                    text,
                })
            })
            .collect()
    }

    /// Apply decisions in order. Store failures abort the remaining decisions.
    pub async fn apply(
        &self,
        store: &dyn MemoryStore,
        owner_id: &str,
        decisions: &[DedupDecision],
        metadata: &Metadata,
    ) -> anyhow::Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();

        for decision in decisions {
            match decision.event {
                DedupEvent::Add => {
                    let entry = store.store(owner_id, &decision.text, metadata.clone()).await?;
                    debug!("Added memory {}", entry.id);
                    outcome.added += 1;
                }
                DedupEvent::Update => {
                    let Some(id) = target_id(decision) else {
                        outcome.skipped += 1;
                        continue;
                    };
                    let new_metadata = (!metadata.is_empty()).then(|| metadata.clone());
                    store.update(&id, &decision.text, new_metadata).await?;
                    debug!("Updated memory {id}");
                    outcome.updated += 1;
                }
                DedupEvent::Delete => {
                    let Some(id) = target_id(decision) else {
                        outcome.skipped += 1;
                        continue;
                    };
                    store.delete(&id).await?;
                    debug!("Deleted memory {id}");
                    outcome.deleted += 1;
                }
                DedupEvent::None => outcome.unchanged += 1,
            }
        }

        Ok(outcome)
    }

    /// Search related memories, decide and apply.
    pub async fn reconcile(
        &self,
        store: &dyn MemoryStore,
        owner_id: &str,
        fact: &str,
        metadata: &Metadata,
    ) -> anyhow::Result<ReconcileOutcome> {
        let existing = store.search(owner_id, fact, self.search_limit).await?;
        let decisions = self.decide(fact, &existing).await;
        let outcome = self.apply(store, owner_id, &decisions, metadata).await?;
        info!(
            "Reconciled fact for {owner_id}: +{} ~{} -{} ={}",
            outcome.added, outcome.updated, outcome.deleted, outcome.unchanged
        );
        Ok(outcome)
    }
}

fn target_id(decision: &DedupDecision) -> Option<Uuid> {
    let Some(raw) = decision.id.as_deref() else {
        warn!("Skipping {:?} decision without an id", decision.event);
        return None;
    };
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Skipping {:?} decision with invalid id {raw}", decision.event);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use parley_core::ChatResponse;
    use parley_core::testing::{ScriptedProvider, Step};

    fn reconciler(steps: Vec<Step>) -> (Arc<ScriptedProvider>, MemoryReconciler) {
        let provider = Arc::new(ScriptedProvider::new(steps));
        let dyn_provider: Arc<dyn LLMProvider> = provider.clone();
        (provider, MemoryReconciler::new(dyn_provider))
    }

    fn entry(content: &str) -> MemoryEntry {
        MemoryEntry::new("alice", content, Metadata::new())
    }

    #[tokio::test]
    async fn empty_existing_adds_without_model_call() {
        let (provider, reconciler) = reconciler(vec![]);
        let decisions = reconciler.decide("Likes green tea", &[]).await;
        assert_eq!(decisions, vec![DedupDecision::add("Likes green tea")]);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_json_adds_original_fact() {
        let (_, reconciler) = reconciler(vec![Step::Respond(ChatResponse::text(
            "I think you should update it",
        ))]);
        let decisions = reconciler.decide("Likes green tea", &[entry("Likes tea")]).await;
        assert_eq!(decisions, vec![DedupDecision::add("Likes green tea")]);
    }

    #[tokio::test]
    async fn model_failure_adds_original_fact() {
        let (_, reconciler) = reconciler(vec![Step::Fail("timeout".to_string())]);
        let decisions = reconciler.decide("Likes green tea", &[entry("Likes tea")]).await;
        assert_eq!(decisions, vec![DedupDecision::add("Likes green tea")]);
    }

    #[tokio::test]
    async fn parses_fenced_decisions_and_lists_existing() {
        let existing = entry("Likes tea");
        let reply = format!(
            "```json\n{{\"memory\": [{{\"id\": \"{}\", \"event\": \"update\", \"text\": \"Likes green tea\"}}, {{\"event\": \"ADD\", \"text\": \"\"}}]}}\n```",
            existing.id
        );
        let (provider, reconciler) = reconciler(vec![Step::Respond(ChatResponse::text(reply))]);
        let decisions = reconciler
            .decide("Drinks tea daily", std::slice::from_ref(&existing))
            .await;

        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].event, DedupEvent::Update);
        assert_eq!(decisions[0].id, Some(existing.id.to_string()));
        assert_eq!(decisions[0].text, "Likes green tea");
        // ADD with empty text falls back to the fact.
        assert_eq!(decisions[1], DedupDecision::add("Drinks tea daily"));

        let prompt = provider.requests()[0][1].text();
        assert!(prompt.contains(&format!("- [{}] Likes tea", existing.id)));
        assert!(prompt.contains("New fact: Drinks tea daily"));
    }

    #[tokio::test]
    async fn apply_runs_decisions_in_order_and_skips_missing_ids() {
        let store = InMemoryStore::new();
        let old = store
            .store("alice", "Lives in Paris", Metadata::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let stale = store
            .store("alice", "Has a cat", Metadata::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let decisions = vec![
            DedupDecision {
                event: DedupEvent::Update,
                id: Some(old.id.to_string()),
                text: "Lives in Berlin".to_string(),
            },
            DedupDecision {
                event: DedupEvent::Delete,
                id: Some(stale.id.to_string()),
                text: String::new(),
            },
            DedupDecision {
                event: DedupEvent::Update,
                id: None,
                text: "orphan".to_string(),
            },
            DedupDecision::add("Works remotely"),
            DedupDecision {
                event: DedupEvent::None,
                id: Some(old.id.to_string()),
                text: String::new(),
            },
        ];

        let (_, reconciler) = reconciler(vec![]);
        let outcome = reconciler
            .apply(&store, "alice", &decisions, &Metadata::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(
            outcome,
            ReconcileOutcome {
                added: 1,
                updated: 1,
                deleted: 1,
                unchanged: 1,
                skipped: 1,
            }
        );
        let mut contents: Vec<String> = store
            .get_all("alice", 10)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.content)
            .collect();
        contents.sort();
        assert_eq!(contents, ["Lives in Berlin", "Works remotely"]);
    }

    #[tokio::test]
    async fn reconcile_adds_first_fact_for_new_owner() {
        let store = InMemoryStore::new();
        let (provider, reconciler) = reconciler(vec![]);
        let outcome = reconciler
            .reconcile(&store, "bob", "Prefers dark mode", &Metadata::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(outcome.added, 1);
        assert_eq!(provider.calls(), 0);
        assert_eq!(store.get_all("bob", 10).await.unwrap_or_default().len(), 1);
    }
}
