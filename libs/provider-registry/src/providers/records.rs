use chatmux_core::{Conversation, ConversationId, Message, ProviderId, ProviderRef};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Provider-native conversation as stored in fixture documents and served by HTTP backends.
///
/// `id` is the native identifier; it becomes the provider reference handle and is qualified
/// with the provider id to form the conversation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub creator: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub created_by_local_account: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl ConversationRecord {
    pub fn to_conversation(&self, provider: &ProviderId) -> Conversation {
        Conversation {
            id: ConversationId::qualified(provider, &self.id),
            subject: self.subject.clone(),
            recipient: self.recipient.clone(),
            creator: self.creator.clone(),
            created_at: self.created_at,
            created_by_local_account: self.created_by_local_account,
            provider_ref: ProviderRef::new(provider.clone(), self.id.clone()),
        }
    }
}
