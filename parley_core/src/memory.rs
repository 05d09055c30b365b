use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A long-term fact about an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub content: String,
    pub owner_id: String,
    /// Relevance to the query; only populated by [`MemoryStore::search`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryEntry {
    #[must_use]
    pub fn new(owner_id: &str, content: &str, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            content: content.to_string(),
            owner_id: owner_id.to_string(),
            score: None,
            created_at: now,
            updated_at: now,
            metadata,
        }
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(
        &self,
        owner_id: &str,
        fact: &str,
        metadata: Metadata,
    ) -> anyhow::Result<MemoryEntry>;

    /// Entries ranked by relevance to `query`, best first.
    async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<MemoryEntry>>;

    async fn get_all(&self, owner_id: &str, limit: usize) -> anyhow::Result<Vec<MemoryEntry>>;

    /// Rewrite the content of `id`; metadata is replaced only when given.
    async fn update(&self, id: &Uuid, fact: &str, metadata: Option<Metadata>)
    -> anyhow::Result<()>;

    async fn delete(&self, id: &Uuid) -> anyhow::Result<()>;
}
