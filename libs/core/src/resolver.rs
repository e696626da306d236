//! Directionality, ordering, and preview rules for rendering threads and lists.
//!
//! Providers expose no identity that is stable across backends, so message direction is
//! inferred from display names alone: when the local account created the thread, its messages
//! are the creator's; otherwise everyone except the creator is presumed local. Group threads
//! with several remote participants are misclassified by this rule.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::normalize::normalize_str;
use crate::types::{Attachment, Conversation, Message, MessageId};

/// Appended to previews that were cut short.
pub const TRUNCATION_MARKER: &str = "…";

/// Default preview length in characters.
pub const DEFAULT_PREVIEW_MAX_CHARS: usize = 100;

/// Decides whether `message` was sent by the local account.
///
/// ```
/// use chatmux_core::{is_outgoing, Conversation, ConversationId, Message, ProviderId, ProviderRef};
/// use time::macros::datetime;
///
/// let provider = ProviderId::from("mail");
/// let conversation = Conversation {
///     id: ConversationId::qualified(&provider, "1"),
///     subject: Some("Hi".into()),
///     recipient: None,
///     creator: "Alice".into(),
///     created_at: datetime!(2024-01-01 0:00 UTC),
///     created_by_local_account: true,
///     provider_ref: ProviderRef::new(provider, "1"),
/// };
/// let message = Message {
///     id: "m1".into(),
///     author: "Alice".into(),
///     content: "hello".into(),
///     sent_at: datetime!(2024-01-01 0:01 UTC),
///     attachments: vec![],
/// };
/// assert!(is_outgoing(&conversation, &message, "Alice"));
/// ```
pub fn is_outgoing(conversation: &Conversation, message: &Message, local_display_name: &str) -> bool {
    let authored_by_creator = message.author == conversation.creator;
    if conversation.created_by_local_account {
        if conversation.creator != local_display_name {
            debug!(
                conversation = %conversation.id,
                creator = %conversation.creator,
                local = %local_display_name,
                "creator name differs from local account name; using creator"
            );
        }
        authored_by_creator
    } else {
        !authored_by_creator
    }
}

/// Sorts messages oldest first. Equal timestamps keep their input order.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by_key(|message| message.sent_at);
}

/// Sorts conversations newest first. Equal timestamps keep their input order.
pub fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Cuts `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`] when cut.
///
/// Counts `char`s, not grapheme clusters.
///
/// ```
/// use chatmux_core::truncate_chars;
///
/// assert_eq!(truncate_chars("short", 10), "short");
/// assert_eq!(truncate_chars("abcdef", 3), "abc…");
/// ```
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => text.to_string(),
    }
}

/// Normalized, truncated body of the chronologically last message.
///
/// Among messages sharing the latest timestamp the one appearing last in the input wins.
/// Returns `None` for an empty thread.
pub fn preview(messages: &[Message], max_chars: usize) -> Option<String> {
    let latest = messages
        .iter()
        .reduce(|latest, candidate| {
            if candidate.sent_at >= latest.sent_at {
                candidate
            } else {
                latest
            }
        })?;
    Some(truncate_chars(&normalize_str(&latest.content), max_chars))
}

/// One rendered row of a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub id: MessageId,
    pub author: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    pub outgoing: bool,
    pub attachments: Vec<Attachment>,
}

/// Orders, normalizes, and tags a fetched thread for display.
pub fn thread_view(
    conversation: &Conversation,
    messages: &[Message],
    local_display_name: &str,
) -> Vec<ThreadEntry> {
    let mut ordered = messages.to_vec();
    sort_messages(&mut ordered);
    ordered
        .into_iter()
        .map(|message| ThreadEntry {
            outgoing: is_outgoing(conversation, &message, local_display_name),
            body: normalize_str(&message.content),
            id: message.id,
            author: message.author,
            sent_at: message.sent_at,
            attachments: message.attachments,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationId, ProviderId, ProviderRef};
    use time::Duration;
    use time::macros::datetime;
    use tracing_test::traced_test;

    fn conversation(creator: &str, created_by_local_account: bool) -> Conversation {
        let provider = ProviderId::from("mail");
        Conversation {
            id: ConversationId::qualified(&provider, "c"),
            subject: Some("subject".into()),
            recipient: None,
            creator: creator.into(),
            created_at: datetime!(2024-03-01 12:00 UTC),
            created_by_local_account,
            provider_ref: ProviderRef::new(provider, "c"),
        }
    }

    fn message(id: &str, author: &str, offset_secs: i64, content: &str) -> Message {
        Message {
            id: id.into(),
            author: author.into(),
            content: content.into(),
            sent_at: datetime!(2024-03-01 12:00 UTC) + Duration::seconds(offset_secs),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn local_creator_owns_creator_messages() {
        let conv = conversation("Alice", true);
        assert!(is_outgoing(&conv, &message("1", "Alice", 0, ""), "Alice"));
        assert!(!is_outgoing(&conv, &message("2", "Bob", 0, ""), "Alice"));
    }

    #[test]
    fn remote_creator_is_the_counterparty() {
        let conv = conversation("Bob", false);
        assert!(is_outgoing(&conv, &message("1", "Alice", 0, ""), "Alice"));
        assert!(!is_outgoing(&conv, &message("2", "Bob", 0, ""), "Alice"));
    }

    #[test]
    fn group_threads_keep_the_display_name_heuristic() {
        let conv = conversation("Bob", false);
        // Carol is a third participant but is still classified as local.
        assert!(is_outgoing(&conv, &message("3", "Carol", 0, ""), "Alice"));
    }

    #[test]
    fn local_display_name_does_not_override_creator() {
        let conv = conversation("Alice (work)", true);
        assert!(is_outgoing(&conv, &message("1", "Alice (work)", 0, ""), "Alice"));
        assert!(!is_outgoing(&conv, &message("2", "Alice", 0, ""), "Alice"));
    }

    #[traced_test]
    #[test]
    fn creator_name_mismatch_is_logged() {
        let conv = conversation("Alice (work)", true);
        is_outgoing(&conv, &message("1", "Bob", 0, ""), "Alice");
        assert!(logs_contain("creator name differs from local account name"));
    }

    #[test]
    fn messages_sort_ascending_and_stable() {
        let mut messages = vec![
            message("t2", "a", 20, ""),
            message("t1", "a", 10, ""),
            message("t3", "a", 30, ""),
            message("tie-a", "a", 20, ""),
        ];
        sort_messages(&mut messages);
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["t1", "t2", "tie-a", "t3"]);
    }

    #[test]
    fn conversations_sort_descending_and_stable() {
        let mut older = conversation("a", true);
        older.id = "x:older".into();
        older.created_at -= Duration::days(1);
        let mut first_tie = conversation("a", true);
        first_tie.id = "x:first".into();
        let mut second_tie = conversation("a", true);
        second_tie.id = "x:second".into();

        let mut list = vec![older, first_tie, second_tie];
        sort_conversations(&mut list);
        let ids: Vec<_> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["x:first", "x:second", "x:older"]);
    }

    #[test]
    fn truncation_counts_chars() {
        let long = "é".repeat(150);
        let cut = truncate_chars(&long, 100);
        assert_eq!(cut.chars().count(), 100 + TRUNCATION_MARKER.chars().count());
        assert!(cut.starts_with(&"é".repeat(100)));
        assert!(cut.ends_with(TRUNCATION_MARKER));

        let exact = "a".repeat(100);
        assert_eq!(truncate_chars(&exact, 100), exact);
    }

    #[test]
    fn preview_uses_latest_normalized_message() {
        let messages = vec![
            message("late", "a", 50, "<p>newest &amp; best</p>"),
            message("early", "a", 5, "oldest"),
        ];
        assert_eq!(preview(&messages, 100).as_deref(), Some("newest & best"));
        assert_eq!(preview(&[], 100), None);
    }

    #[test]
    fn preview_tie_prefers_later_input() {
        let messages = vec![message("a", "x", 10, "first"), message("b", "x", 10, "second")];
        assert_eq!(preview(&messages, 100).as_deref(), Some("second"));
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(150);
        let messages = vec![message("m", "a", 0, &body)];
        let preview = preview(&messages, 100).unwrap();
        assert_eq!(preview, format!("{}{}", "x".repeat(100), TRUNCATION_MARKER));
    }

    #[test]
    fn thread_view_orders_normalizes_and_tags() {
        let conv = conversation("Bob", false);
        let messages = vec![
            message("2", "Alice", 20, "<i>reply</i>"),
            message("1", "Bob", 10, "hi&nbsp;there"),
        ];
        let view = thread_view(&conv, &messages, "Alice");
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id.as_str(), "1");
        assert_eq!(view[0].body, "hi there");
        assert!(!view[0].outgoing);
        assert_eq!(view[1].body, "reply");
        assert!(view[1].outgoing);
    }
}
