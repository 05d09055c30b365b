use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{Embedder, MemoryStore, Metadata};
use parley_memory::MemoryManager;
use serde_json::json;

async fn manager() -> MemoryManager {
    MemoryManager::new("sqlite::memory:")
        .await
        .unwrap_or_else(|e| panic!("failed to open database: {e}"))
}

/// Embeds text as a two-dimensional "tea-ness" vector.
struct TeaEmbedder;

#[async_trait]
impl Embedder for TeaEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if text.to_lowercase().contains("tea") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }
}

#[tokio::test]
async fn stores_and_dedups_by_content_hash() {
    let manager = manager().await;
    let first = manager
        .store("alice", "Likes green tea", Metadata::new())
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    let again = manager
        .store("alice", "  likes GREEN tea ", Metadata::new())
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(first.id, again.id);

    // Same fact for another owner is a separate memory.
    let other = manager
        .store("bob", "Likes green tea", Metadata::new())
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    assert_ne!(first.id, other.id);

    assert_eq!(manager.get_all("alice", 10).await.unwrap_or_default().len(), 1);
}

#[tokio::test]
async fn keyword_search_without_embedder() {
    let manager = manager().await;
    for fact in ["Likes green tea", "Owns a bicycle"] {
        manager
            .store("alice", fact, Metadata::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
    }
    let results = manager
        .search("alice", "what tea do I like", 5)
        .await
        .unwrap_or_default();
    assert_eq!(results[0].content, "Likes green tea");
    assert!(results[0].score.is_some_and(|s| s > 0.0));
}

#[tokio::test]
async fn hybrid_search_prefers_embedding_match() {
    let manager = manager().await.with_embedder(Arc::new(TeaEmbedder));
    for fact in ["Enjoys oolong tea", "Cycles to work"] {
        manager
            .store("alice", fact, Metadata::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
    }
    let results = manager
        .search("alice", "favourite tea", 1)
        .await
        .unwrap_or_default();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "Enjoys oolong tea");
    assert!(results[0].score.is_some_and(|s| s > 0.7));
}

#[tokio::test]
async fn update_and_delete() {
    let manager = manager().await;
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), json!("chat"));
    let entry = manager
        .store("alice", "Lives in Paris", metadata)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    manager
        .update(&entry.id, "Lives in Berlin", None)
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    let all = manager.get_all("alice", 10).await.unwrap_or_default();
    assert_eq!(all[0].content, "Lives in Berlin");
    assert_eq!(all[0].metadata["source"], "chat");
    assert!(all[0].updated_at >= all[0].created_at);

    manager.delete(&entry.id).await.unwrap_or_else(|e| panic!("{e}"));
    assert!(manager.get_all("alice", 10).await.unwrap_or_default().is_empty());
    assert!(manager.delete(&entry.id).await.is_err());
}
