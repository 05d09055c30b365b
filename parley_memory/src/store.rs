use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parley_core::{MemoryEntry, MemoryStore, Metadata};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::scoring::keyword_overlap;

/// Process-local memory store ranked by keyword overlap.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Vec<MemoryEntry>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: &Uuid) -> anyhow::Error {
    anyhow::anyhow!("memory not found: {id}")
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn store(
        &self,
        owner_id: &str,
        fact: &str,
        metadata: Metadata,
    ) -> anyhow::Result<MemoryEntry> {
        let entry = MemoryEntry::new(owner_id, fact, metadata);
        self.entries
            .write()
            .await
            .entry(owner_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<MemoryEntry>> {
        let entries = self.entries.read().await;
        let Some(owned) = entries.get(owner_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<MemoryEntry> = owned
            .iter()
            .filter_map(|entry| {
                let score = keyword_overlap(query, &entry.content);
                (score > 0.0).then(|| MemoryEntry {
                    score: Some(score),
                    ..entry.clone()
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get_all(&self, owner_id: &str, limit: usize) -> anyhow::Result<Vec<MemoryEntry>> {
        let entries = self.entries.read().await;
        let mut owned = entries.get(owner_id).cloned().unwrap_or_default();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn update(
        &self,
        id: &Uuid,
        fact: &str,
        metadata: Option<Metadata>,
    ) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .values_mut()
            .flat_map(|owned| owned.iter_mut())
            .find(|e| e.id == *id)
            .ok_or_else(|| not_found(id))?;
        entry.content = fact.to_string();
        entry.updated_at = Utc::now();
        if let Some(metadata) = metadata {
            entry.metadata = metadata;
        }
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        for owned in entries.values_mut() {
            if let Some(pos) = owned.iter().position(|e| e.id == *id) {
                owned.remove(pos);
                return Ok(());
            }
        }
        Err(not_found(id))
    }
}
