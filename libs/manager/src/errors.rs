use chatmux_core::{CapabilityTag, ConversationId, ProviderError, ProviderId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManagerError {
    #[error("message text is empty")]
    EmptyInput,
    #[error("no conversation selected")]
    NoConversationSelected,
    #[error("conversation `{conversation}` does not support `{capability}`")]
    CapabilityDenied {
        capability: CapabilityTag,
        conversation: ConversationId,
    },
    #[error("provider `{0}` registered twice")]
    DuplicateProvider(ProviderId),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ManagerError {
    /// True when nothing reached an adapter.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::NoConversationSelected | Self::CapabilityDenied { .. }
        )
    }
}
