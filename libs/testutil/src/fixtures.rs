use chatmux_core::{Conversation, ConversationId, Message, ProviderId, ProviderRef};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

/// Fixed clock origin used by every builder.
pub const EPOCH: OffsetDateTime = datetime!(2024-01-01 0:00 UTC);

/// `EPOCH` shifted by `minutes`.
pub fn at(minutes: i64) -> OffsetDateTime {
    EPOCH + Duration::minutes(minutes)
}

pub fn message(id: &str, author: &str, content: &str, sent_at: OffsetDateTime) -> Message {
    Message {
        id: id.into(),
        author: author.to_string(),
        content: content.to_string(),
        sent_at,
        attachments: Vec::new(),
    }
}

pub fn conversation(provider: &str, native: &str) -> ConversationBuilder {
    ConversationBuilder::new(provider, native)
}

/// Builds a conversation owned by `provider`, with `native` as its handle.
#[derive(Debug, Clone)]
pub struct ConversationBuilder {
    provider: ProviderId,
    native: String,
    subject: Option<String>,
    creator: String,
    created_at: OffsetDateTime,
    created_by_local_account: bool,
}

impl ConversationBuilder {
    fn new(provider: &str, native: &str) -> Self {
        Self {
            provider: ProviderId::from(provider),
            native: native.to_string(),
            subject: None,
            creator: "Alice".into(),
            created_at: EPOCH,
            created_by_local_account: true,
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = creator.to_string();
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn remote(mut self) -> Self {
        self.created_by_local_account = false;
        self
    }

    pub fn build(self) -> Conversation {
        Conversation {
            id: ConversationId::qualified(&self.provider, &self.native),
            subject: self.subject,
            recipient: None,
            creator: self.creator,
            created_at: self.created_at,
            created_by_local_account: self.created_by_local_account,
            provider_ref: ProviderRef::new(self.provider, self.native),
        }
    }
}
