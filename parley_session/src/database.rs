use async_trait::async_trait;
use chrono::Utc;
use parley_core::{Message, Session};
use parley_entities::{ensure_table, sessions};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{tail, validate_all};

/// Owns the database connection and hands out per-key sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    db: DatabaseConnection,
}

impl SessionManager {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to database: {}", database_url);
        let db = Database::connect(database_url).await?;
        Self::from_connection(db).await
    }

    pub async fn from_connection(db: DatabaseConnection) -> anyhow::Result<Self> {
        ensure_table(&db, sessions::Entity).await?;
        info!("SessionManager initialized");
        Ok(Self { db })
    }

    #[must_use]
    pub fn session(&self, key: &str) -> DatabaseSession {
        DatabaseSession {
            db: self.db.clone(),
            key: key.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn clear_session(&self, key: &str) -> anyhow::Result<()> {
        sessions::Entity::delete_by_id(key.to_owned())
            .exec(&self.db)
            .await?;

        info!("Cleared session: {}", key);
        Ok(())
    }

    pub async fn list_sessions(&self) -> anyhow::Result<Vec<String>> {
        let session_models = sessions::Entity::find().all(&self.db).await?;

        Ok(session_models.into_iter().map(|s| s.key).collect())
    }
}

/// Session whose history is one JSON row keyed by session id.
///
/// Writes through one handle are serialized; two handles for the same key
/// may still interleave.
#[derive(Debug)]
pub struct DatabaseSession {
    db: DatabaseConnection,
    key: String,
    write_lock: Mutex<()>,
}

impl DatabaseSession {
    async fn load(&self) -> anyhow::Result<Option<sessions::Model>> {
        Ok(sessions::Entity::find_by_id(self.key.clone())
            .one(&self.db)
            .await?)
    }

    async fn load_messages(&self) -> anyhow::Result<Vec<Message>> {
        match self.load().await? {
            Some(model) => Ok(serde_json::from_str(&model.messages)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, messages: &[Message]) -> anyhow::Result<()> {
        let messages_json = serde_json::to_string(messages)?;
        let now = Utc::now().naive_utc();

        if let Some(existing) = self.load().await? {
            sessions::Entity::update(sessions::ActiveModel {
                key: Set(existing.key),
                messages: Set(messages_json),
                created_at: Set(existing.created_at),
                updated_at: Set(now),
            })
            .exec(&self.db)
            .await?;
        } else {
            sessions::ActiveModel {
                key: Set(self.key.clone()),
                messages: Set(messages_json),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&self.db)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Session for DatabaseSession {
    fn id(&self) -> &str {
        &self.key
    }

    async fn messages(&self, limit: Option<usize>) -> anyhow::Result<Vec<Message>> {
        Ok(tail(&self.load_messages().await?, limit))
    }

    async fn add_messages(&self, messages: &[Message]) -> anyhow::Result<()> {
        validate_all(messages)?;
        let _guard = self.write_lock.lock().await;
        let mut stored = self.load_messages().await?;
        stored.extend_from_slice(messages);
        self.save(&stored).await?;
        debug!("Added {} message(s) to session: {}", messages.len(), self.key);
        Ok(())
    }

    async fn pop_message(&self) -> anyhow::Result<Option<Message>> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.load_messages().await?;
        let popped = stored.pop();
        if popped.is_some() {
            self.save(&stored).await?;
        }
        Ok(popped)
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        sessions::Entity::delete_by_id(self.key.clone())
            .exec(&self.db)
            .await?;
        info!("Cleared session: {}", self.key);
        Ok(())
    }
}
