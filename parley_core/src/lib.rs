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

//! Shared data model and collaborator contracts for parley.
//!
//! Everything the conversation engine consumes from the outside world is a
//! small trait defined here: [`LLMProvider`], [`Session`], [`MemoryStore`],
//! [`TokenCounter`] and [`Tool`]. Concrete implementations live in the
//! sibling crates.

pub mod memory;
pub mod message;
pub mod provider;
pub mod session;
pub mod tokens;
pub mod tools;
pub mod util;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use memory::{MemoryEntry, MemoryStore, Metadata};
pub use message::{ContentPart, Message, MessageError, Role, ToolCall, ToolResultPart};
pub use provider::{
    ChatEvent, ChatResponse, ChatStream, Embedder, FinishReason, LLMProvider, ModelInfo, Usage,
};
pub use session::Session;
pub use tokens::{HeuristicTokenCounter, TokenCounter};
pub use tools::{Tool, ToolDefinition, ToolExecutionResult, ToolExecutor, ToolRegistry};
pub use util::content_hash;
