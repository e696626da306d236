use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use time::OffsetDateTime;
use url::Url;

/// Title shown for a conversation that carries neither a subject nor a recipient.
pub const UNTITLED_CONVERSATION: &str = "(untitled conversation)";

/// Identifier a provider adapter registers under (one per configured account).
///
/// ```
/// use chatmux_core::ProviderId;
///
/// let id = ProviderId::from("mail");
/// assert_eq!(id.as_str(), "mail");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-qualified conversation identifier, unique across the merged list.
///
/// ```
/// use chatmux_core::{ConversationId, ProviderId};
///
/// let id = ConversationId::qualified(&ProviderId::from("mail"), "thread-7");
/// assert_eq!(id.as_str(), "mail:thread-7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds the `<provider>:<native>` form adapters are expected to emit.
    pub fn qualified(provider: &ProviderId, native: &str) -> Self {
        Self(format!("{}:{}", provider.as_str(), native))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message identifier, unique within its conversation and stable across fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle back into the provider that produced a conversation.
///
/// `handle` is only ever interpreted by the adapter registered as `provider`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderRef {
    pub provider: ProviderId,
    pub handle: String,
}

impl ProviderRef {
    pub fn new(provider: ProviderId, handle: impl Into<String>) -> Self {
        Self {
            provider,
            handle: handle.into(),
        }
    }
}

/// A messaging thread owned by exactly one provider.
///
/// ```
/// use chatmux_core::{Conversation, ConversationId, ProviderId, ProviderRef};
/// use time::macros::datetime;
///
/// let provider = ProviderId::from("mail");
/// let conversation = Conversation {
///     id: ConversationId::qualified(&provider, "t-1"),
///     subject: None,
///     recipient: Some("Bob".into()),
///     creator: "Alice".into(),
///     created_at: datetime!(2024-05-01 09:00 UTC),
///     created_by_local_account: true,
///     provider_ref: ProviderRef::new(provider, "t-1"),
/// };
/// assert_eq!(conversation.display_title(), "Bob");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    pub creator: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by_local_account: bool,
    pub provider_ref: ProviderRef,
}

impl Conversation {
    /// Subject, then recipient, then a placeholder. Blank strings count as absent.
    pub fn display_title(&self) -> &str {
        non_blank(self.subject.as_deref())
            .or_else(|| non_blank(self.recipient.as_deref()))
            .unwrap_or(UNTITLED_CONVERSATION)
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider_ref.provider
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A single message as supplied by a provider. `content` is provider-native markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A file attached to a message. The URL is opened directly; bytes are never fetched here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: Url,
}
