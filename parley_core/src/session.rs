use async_trait::async_trait;

use crate::message::Message;

/// Durable conversation history for one session.
///
/// Implementations own their locking. The controller issues read-then-write
/// sequences without cross-call coordination, so two turns running against
/// the same session concurrently may interleave their writes.
#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> &str;

    /// Stored messages in order. `Some(n)` returns only the last `n`.
    async fn messages(&self, limit: Option<usize>) -> anyhow::Result<Vec<Message>>;

    /// Append messages. Implementations reject messages without parts.
    async fn add_messages(&self, messages: &[Message]) -> anyhow::Result<()>;

    /// Remove and return the newest message.
    async fn pop_message(&self) -> anyhow::Result<Option<Message>>;

    async fn clear(&self) -> anyhow::Result<()>;
}
