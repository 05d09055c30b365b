use tokio_util::sync::CancellationToken;

/// Per-call identity and cancellation.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    /// Memory owner; falls back to the controller's default owner.
    pub owner_id: Option<String>,
    pub cancel: CancellationToken,
}

impl TurnContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
