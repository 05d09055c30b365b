use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parley_core::{Embedder, MemoryEntry, MemoryStore, Metadata, content_hash};
use parley_entities::{ensure_table, memories};
use rayon::prelude::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::convert;
use crate::scoring;

/// Database-backed memory store.
///
/// Facts are deduplicated per owner by content hash. When an embedder is
/// configured, search ranks by hybrid vector and keyword similarity;
/// otherwise by keyword overlap alone.
pub struct MemoryManager {
    db: DatabaseConnection,
    embedder: Option<Arc<dyn Embedder>>,
}

impl MemoryManager {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to database for MemoryManager");
        let db = Database::connect(database_url).await?;
        Self::from_connection(db).await
    }

    pub async fn from_connection(db: DatabaseConnection) -> anyhow::Result<Self> {
        ensure_table(&db, memories::Entity).await?;
        info!("MemoryManager initialized");
        Ok(Self { db, embedder: None })
    }

    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Embedding for `text`, or `None` without an embedder or on failure.
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("Embedding failed, falling back to keyword scoring: {e}");
                None
            }
        }
    }

    async fn find_by_content_hash(
        &self,
        owner_id: &str,
        hash: &str,
    ) -> anyhow::Result<Option<memories::Model>> {
        Ok(memories::Entity::find()
            .filter(memories::Column::OwnerId.eq(owner_id))
            .filter(memories::Column::ContentHash.eq(hash))
            .one(&self.db)
            .await?)
    }

    async fn find_model(&self, id: &Uuid) -> anyhow::Result<memories::Model> {
        memories::Entity::find_by_id(*id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("memory not found: {id}"))
    }
}

#[async_trait]
impl MemoryStore for MemoryManager {
    async fn store(
        &self,
        owner_id: &str,
        fact: &str,
        metadata: Metadata,
    ) -> anyhow::Result<MemoryEntry> {
        let hash = content_hash(owner_id, fact);
        if let Some(existing) = self.find_by_content_hash(owner_id, &hash).await? {
            debug!("Fact already stored as {}", existing.id);
            return Ok(convert::memory_entry_from_model(existing));
        }

        let entry = MemoryEntry::new(owner_id, fact, metadata);
        let embedding = self.embed(fact).await;
        memories::ActiveModel {
            id: Set(entry.id),
            owner_id: Set(entry.owner_id.clone()),
            content: Set(entry.content.clone()),
            content_hash: Set(hash),
            embedding: Set(embedding.as_deref().map(convert::embedding_to_json)),
            metadata: Set(Value::Object(entry.metadata.clone())),
            created_at: Set(entry.created_at),
            updated_at: Set(entry.updated_at),
        }
        .insert(&self.db)
        .await?;

        info!("Inserted new memory: {}", entry.id);
        Ok(entry)
    }

    async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<MemoryEntry>> {
        let models = memories::Entity::find()
            .filter(memories::Column::OwnerId.eq(owner_id))
            .all(&self.db)
            .await?;
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = self.embed(query).await;

        let mut scored: Vec<MemoryEntry> = models
            .into_par_iter()
            .filter_map(|model| {
                let keyword = scoring::keyword_overlap(query, &model.content);
                let stored = model.embedding.as_ref().and_then(convert::json_to_embedding);
                let score = match (query_embedding.as_deref(), stored.as_deref()) {
                    (Some(q), Some(e)) => {
                        scoring::hybrid_similarity(scoring::cosine_similarity(q, e), keyword)
                    }
                    _ => keyword,
                };
                (score > 0.0).then(|| MemoryEntry {
                    score: Some(score),
                    ..convert::memory_entry_from_model(model)
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
        scored.truncate(limit);
        debug!("Memory search for {owner_id} returned {}", scored.len());
        Ok(scored)
    }

    async fn get_all(&self, owner_id: &str, limit: usize) -> anyhow::Result<Vec<MemoryEntry>> {
        let models = memories::Entity::find()
            .filter(memories::Column::OwnerId.eq(owner_id))
            .order_by_desc(memories::Column::UpdatedAt)
            .limit(u64::try_from(limit).unwrap_or(u64::MAX))
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(convert::memory_entry_from_model)
            .collect())
    }

    async fn update(
        &self,
        id: &Uuid,
        fact: &str,
        metadata: Option<Metadata>,
    ) -> anyhow::Result<()> {
        let existing = self.find_model(id).await?;
        let embedding = self.embed(fact).await;

        let mut model: memories::ActiveModel = existing.clone().into();
        model.content = Set(fact.to_string());
        model.content_hash = Set(content_hash(&existing.owner_id, fact));
        model.embedding = Set(embedding.as_deref().map(convert::embedding_to_json));
        if let Some(metadata) = metadata {
            model.metadata = Set(Value::Object(metadata));
        }
        model.updated_at = Set(Utc::now());
        model.update(&self.db).await?;

        info!("Updated memory: {id}");
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> anyhow::Result<()> {
        let existing = self.find_model(id).await?;
        existing.delete(&self.db).await?;
        info!("Deleted memory: {id}");
        Ok(())
    }
}
