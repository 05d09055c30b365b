#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Session storage: conversation history in memory or in a database.

mod database;
mod in_memory;

use parley_core::Message;

pub use database::{DatabaseSession, SessionManager};
pub use in_memory::InMemorySession;

/// The last `limit` messages, or all of them.
fn tail(messages: &[Message], limit: Option<usize>) -> Vec<Message> {
    let start = limit.map_or(0, |n| messages.len().saturating_sub(n));
    messages[start..].to_vec()
}

fn validate_all(messages: &[Message]) -> anyhow::Result<()> {
    for message in messages {
        message.validate()?;
    }
    Ok(())
}
