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

//! Conversation control: one user turn at a time.
//!
//! A turn loads the session history, injects relevant memories into the
//! system prompt, fits the history to the token budget, then alternates
//! between the model and the tool executor until the model stops asking for
//! tools or the iteration cap is reached. Extracted facts are reconciled into
//! long-term memory in the background.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use parley_conversation::{ConversationControllerBuilder, TurnContext};
//! use parley_core::{LLMProvider, Message};
//! use parley_session::InMemorySession;
//!
//! # async fn example(provider: Arc<dyn LLMProvider>) -> anyhow::Result<()> {
//! let controller = ConversationControllerBuilder::new(provider)
//!     .with_system_prompt("You are terse.")
//!     .build()?;
//! let session = InMemorySession::new("demo");
//! let reply = controller
//!     .chat(&session, Message::user("hello"), &TurnContext::new())
//!     .await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

mod builder;
mod context;
mod controller;
mod error;
mod memory;
mod stream;

pub use builder::{ContextOptions, ConversationControllerBuilder};
pub use context::TurnContext;
pub use controller::{ConversationController, STREAM_BUFFER};
pub use error::{ConfigError, ConversationError};
pub use memory::MemoryOptions;
pub use stream::consume_stream;
