//! Utility functions for content hashing and default prompts.

use sha2::{Digest, Sha256};

/// Default system prompt for agents with memory support.
pub const DEFAULT_SYSTEM_PROMPT_WITH_MEMORY: &str = "You are a helpful AI assistant with memory of past conversations. Provide clear, concise responses.";

/// Default system prompt for agents without memory.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// SHA-256 hex digest of an owner-scoped fact, used to drop exact duplicates.
#[must_use]
pub fn content_hash(owner_id: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(b":");
    hasher.update(content.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}
