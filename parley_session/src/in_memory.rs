use async_trait::async_trait;
use parley_core::{Message, Session};
use tokio::sync::RwLock;

use crate::{tail, validate_all};

/// Session that lives only as long as the process.
#[derive(Debug)]
pub struct InMemorySession {
    id: String,
    messages: RwLock<Vec<Message>>,
}

impl InMemorySession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = RwLock::new(messages);
        self
    }
}

#[async_trait]
impl Session for InMemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn messages(&self, limit: Option<usize>) -> anyhow::Result<Vec<Message>> {
        Ok(tail(&self.messages.read().await, limit))
    }

    async fn add_messages(&self, messages: &[Message]) -> anyhow::Result<()> {
        validate_all(messages)?;
        self.messages.write().await.extend_from_slice(messages);
        Ok(())
    }

    async fn pop_message(&self) -> anyhow::Result<Option<Message>> {
        Ok(self.messages.write().await.pop())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.messages.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_in_order_and_limits_from_the_end() {
        let session = InMemorySession::new("s1");
        session
            .add_messages(&[Message::user("one"), Message::assistant("two")])
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        session
            .add_messages(&[Message::user("three")])
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let all = session.messages(None).await.unwrap_or_default();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].text(), "one");

        let last = session.messages(Some(2)).await.unwrap_or_default();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].text(), "two");

        let more = session.messages(Some(10)).await.unwrap_or_default();
        assert_eq!(more.len(), 3);
    }

    #[tokio::test]
    async fn rejects_empty_messages_atomically() {
        let session = InMemorySession::new("s1");
        let result = session
            .add_messages(&[Message::user("ok"), Message::assistant("")])
            .await;
        assert!(result.is_err());
        assert!(session.messages(None).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn pop_and_clear() {
        let session = InMemorySession::new("s1")
            .with_messages(vec![Message::user("a"), Message::assistant("b")]);
        let popped = session.pop_message().await.unwrap_or_default();
        assert_eq!(popped.map(|m| m.text()), Some("b".to_string()));

        session.clear().await.unwrap_or_else(|e| panic!("{e}"));
        assert!(session.pop_message().await.unwrap_or_default().is_none());
        assert_eq!(session.id(), "s1");
    }
}
