use thiserror::Error;

use crate::types::{ConversationId, ProviderId};

/// Failure reported by a provider adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Transient failure such as a network error or an overloaded backend.
    #[error("provider `{provider}` unavailable: {reason}")]
    ProviderUnavailable { provider: ProviderId, reason: String },
    /// The provider session is no longer valid.
    #[error("provider `{provider}` session expired")]
    AuthExpired { provider: ProviderId },
    /// A conversation was routed to an adapter that did not produce it.
    #[error("conversation `{conversation}` does not belong to provider `{provider}`")]
    InvalidReference {
        provider: ProviderId,
        conversation: ConversationId,
    },
    /// The provider refused the outbound message.
    #[error("provider `{provider}` rejected the message: {reason}")]
    SendRejected { provider: ProviderId, reason: String },
}

impl ProviderError {
    pub fn unavailable(provider: &ProviderId, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.clone(),
            reason: reason.into(),
        }
    }

    pub fn auth_expired(provider: &ProviderId) -> Self {
        Self::AuthExpired {
            provider: provider.clone(),
        }
    }

    pub fn invalid_reference(provider: &ProviderId, conversation: &ConversationId) -> Self {
        Self::InvalidReference {
            provider: provider.clone(),
            conversation: conversation.clone(),
        }
    }

    pub fn rejected(provider: &ProviderId, reason: impl Into<String>) -> Self {
        Self::SendRejected {
            provider: provider.clone(),
            reason: reason.into(),
        }
    }

    /// Returns the provider that raised the error.
    pub fn provider(&self) -> &ProviderId {
        match self {
            Self::ProviderUnavailable { provider, .. }
            | Self::AuthExpired { provider }
            | Self::InvalidReference { provider, .. }
            | Self::SendRejected { provider, .. } => provider,
        }
    }

    /// Indicates whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }

    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::AuthExpired { .. } => "auth_expired",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::SendRejected { .. } => "send_rejected",
        }
    }
}
