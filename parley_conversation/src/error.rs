use parley_core::MessageError;
use thiserror::Error;

/// Why a turn failed.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("model provider error: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("session error: {0}")]
    Session(#[source] anyhow::Error),

    #[error("context strategy error: {0}")]
    Context(#[source] anyhow::Error),

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("turn canceled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Rejected controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("context token budget must be greater than zero")]
    ZeroTokenBudget,

    #[error("memory search limit must be greater than zero")]
    ZeroSearchLimit,
}
