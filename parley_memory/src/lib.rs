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

//! Long-term memory for conversations.
//!
//! - [`FactExtractor`] pulls durable facts out of an exchange
//! - [`MemoryReconciler`] decides whether a fact is new, refines an existing
//!   memory, contradicts one, or is already known
//! - [`InMemoryStore`] and [`MemoryManager`] implement
//!   [`parley_core::MemoryStore`]

mod convert;
mod extraction;
mod json;
mod manager;
mod reconciler;
pub mod scoring;
mod store;

pub use extraction::{EXTRACTION_SYSTEM_PROMPT, FactExtractor};
pub use json::first_json_object;
pub use manager::MemoryManager;
pub use reconciler::{
    DEDUP_SYSTEM_PROMPT, DedupDecision, DedupEvent, MemoryReconciler, ReconcileOutcome,
};
pub use store::InMemoryStore;
