use std::sync::Arc;

use async_trait::async_trait;
use chatmux_core::{CapabilityTag, Conversation, Message, ProviderError, ProviderId};

/// Contract every backend integration implements.
///
/// Adapters hold no state the manager depends on between calls; every call returns owned data.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier this adapter was configured with. Conversations it emits carry it in their
    /// provider reference.
    fn provider_id(&self) -> &ProviderId;

    /// Fails with `ProviderUnavailable` or `AuthExpired`.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ProviderError>;

    /// Fails with `InvalidReference` when `conversation` came from another adapter.
    async fn list_messages(&self, conversation: &Conversation)
    -> Result<Vec<Message>, ProviderError>;

    /// `text` is already trimmed and non-empty.
    async fn send(&self, conversation: &Conversation, text: &str) -> Result<(), ProviderError>;

    /// Pure predicate; answer `false` when unsure.
    fn has_capability(&self, tag: &CapabilityTag, created_by_local_account: bool) -> bool;
}

pub type SharedAdapter = Arc<dyn ProviderAdapter>;

/// Rejects conversations whose provider reference points at a different adapter.
pub fn ensure_owned(provider: &ProviderId, conversation: &Conversation) -> Result<(), ProviderError> {
    if conversation.provider() == provider {
        Ok(())
    } else {
        Err(ProviderError::invalid_reference(provider, &conversation.id))
    }
}
