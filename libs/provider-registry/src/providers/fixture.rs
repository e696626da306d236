//! File-backed provider: a JSON document acting as a local message database.
//!
//! The document is re-read on every call so edits made by other tools show up on the next
//! refresh. Sends append to the owning conversation and write the document back.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chatmux_core::{
    CapabilityTable, CapabilityTag, Conversation, Message, MessageId, ProviderError, ProviderId,
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::records::ConversationRecord;
use crate::manifest::ProviderManifest;
use crate::registry::{ProviderConfig, ProviderRegistry, RegistryError};
use crate::traits::{ProviderAdapter, SharedAdapter, ensure_owned};

const MANIFEST_STR: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/manifests/fixture.json"
));

pub fn register(registry: &mut ProviderRegistry) -> Result<(), RegistryError> {
    let manifest = ProviderManifest::from_json(MANIFEST_STR)?;
    registry.register(manifest, |config, manifest| {
        FixtureAdapter::from_config(config, manifest).map(|adapter| Arc::new(adapter) as SharedAdapter)
    })
}

/// On-disk layout of a fixture document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(default)]
    pub conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Deserialize)]
struct FixtureSettings {
    path: PathBuf,
    account_name: String,
    #[serde(default)]
    capabilities: Option<CapabilityTable>,
    #[serde(default)]
    max_text_len: Option<u32>,
}

pub struct FixtureAdapter {
    id: ProviderId,
    path: PathBuf,
    account_name: String,
    capabilities: CapabilityTable,
    max_text_len: Option<u32>,
    /// Readers share the document; a send holds it exclusively from load to rename.
    document_lock: RwLock<()>,
}

impl FixtureAdapter {
    pub fn new(
        id: ProviderId,
        path: impl Into<PathBuf>,
        account_name: impl Into<String>,
        capabilities: CapabilityTable,
    ) -> Self {
        Self {
            id,
            path: path.into(),
            account_name: account_name.into(),
            capabilities,
            max_text_len: None,
            document_lock: RwLock::new(()),
        }
    }

    pub fn with_max_text_len(mut self, max_text_len: Option<u32>) -> Self {
        self.max_text_len = max_text_len;
        self
    }

    fn from_config(
        config: &ProviderConfig,
        manifest: &ProviderManifest,
    ) -> Result<Self, RegistryError> {
        let settings: FixtureSettings = serde_json::from_value(config.settings.clone())
            .map_err(|err| RegistryError::invalid_settings(&config.id, err.to_string()))?;
        if settings.account_name.trim().is_empty() {
            return Err(RegistryError::invalid_settings(
                &config.id,
                "account_name must not be empty",
            ));
        }
        let capabilities = settings
            .capabilities
            .unwrap_or_else(|| manifest.capabilities.clone());
        Ok(Self::new(
            config.id.clone(),
            settings.path,
            settings.account_name,
            capabilities,
        )
        .with_max_text_len(settings.max_text_len.or(manifest.max_text_len)))
    }

    async fn read_document(&self) -> Result<FixtureDocument, ProviderError> {
        let _guard = self.document_lock.read().await;
        self.load().await
    }

    async fn load(&self) -> Result<FixtureDocument, ProviderError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            ProviderError::unavailable(&self.id, format!("read {}: {err}", self.path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            ProviderError::unavailable(&self.id, format!("parse {}: {err}", self.path.display()))
        })
    }

    /// Writes a sibling temp file and renames it over the document, so readers in other
    /// processes see either the old or the new version.
    async fn store(&self, document: &FixtureDocument) -> Result<(), ProviderError> {
        let data = serde_json::to_vec_pretty(document).map_err(|err| {
            ProviderError::unavailable(&self.id, format!("serialize fixture: {err}"))
        })?;
        let path = self.path.clone();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(&data)?;
            file.as_file().sync_all()?;
            file.persist(&path).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(|err| ProviderError::unavailable(&self.id, format!("write task: {err}")))?;
        written.map_err(|err| {
            ProviderError::unavailable(&self.id, format!("write {}: {err}", self.path.display()))
        })
    }
}

/// Stored bodies are markup; escape the delimiters the normalizer would otherwise eat.
fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[async_trait]
impl ProviderAdapter for FixtureAdapter {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ProviderError> {
        let document = self.read_document().await?;
        debug!(provider = %self.id, count = document.conversations.len(), "fixture conversations loaded");
        Ok(document
            .conversations
            .iter()
            .map(|record| record.to_conversation(&self.id))
            .collect())
    }

    async fn list_messages(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<Message>, ProviderError> {
        ensure_owned(&self.id, conversation)?;
        let document = self.read_document().await?;
        document
            .conversations
            .into_iter()
            .find(|record| record.id == conversation.provider_ref.handle)
            .map(|record| record.messages)
            .ok_or_else(|| ProviderError::invalid_reference(&self.id, &conversation.id))
    }

    async fn send(&self, conversation: &Conversation, text: &str) -> Result<(), ProviderError> {
        ensure_owned(&self.id, conversation)?;
        if let Some(limit) = self.max_text_len {
            let len = text.chars().count();
            if len > limit as usize {
                return Err(ProviderError::rejected(
                    &self.id,
                    format!("text is {len} characters, limit is {limit}"),
                ));
            }
        }

        let _guard = self.document_lock.write().await;
        let mut document = self.load().await?;
        let record = document
            .conversations
            .iter_mut()
            .find(|record| record.id == conversation.provider_ref.handle)
            .ok_or_else(|| ProviderError::invalid_reference(&self.id, &conversation.id))?;
        let message_id = MessageId::new(Uuid::new_v4().to_string());
        record.messages.push(Message {
            id: message_id.clone(),
            author: self.account_name.clone(),
            content: escape_markup(text),
            sent_at: OffsetDateTime::now_utc(),
            attachments: Vec::new(),
        });
        self.store(&document).await?;
        info!(provider = %self.id, conversation = %conversation.id, message = %message_id, "fixture message appended");
        Ok(())
    }

    fn has_capability(&self, tag: &CapabilityTag, created_by_local_account: bool) -> bool {
        self.capabilities.allows(tag, created_by_local_account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatmux_core::{CapabilityRule, ConversationId, ProviderRef, normalize_str};
    use serde_json::json;
    use tempfile::TempDir;

    fn write_document(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("fixture.json");
        let document = json!({
            "conversations": [
                {
                    "id": "t-1",
                    "subject": "Lunch",
                    "creator": "Alice",
                    "created_at": "2024-05-01T09:00:00Z",
                    "created_by_local_account": true,
                    "messages": [
                        {
                            "id": "m-1",
                            "author": "Alice",
                            "content": "<b>Noon?</b>",
                            "sent_at": "2024-05-01T09:00:00Z",
                            "attachments": [
                                { "name": "menu.pdf", "url": "https://example.com/menu.pdf" }
                            ]
                        }
                    ]
                },
                {
                    "id": "t-2",
                    "recipient": "Bob",
                    "creator": "Bob",
                    "created_at": "2024-05-02T09:00:00Z"
                }
            ]
        });
        std::fs::write(&path, document.to_string()).unwrap();
        path
    }

    fn adapter(path: PathBuf) -> FixtureAdapter {
        FixtureAdapter::new(
            ProviderId::from("mail"),
            path,
            "Alice",
            CapabilityTable::new(vec![CapabilityRule::new(CapabilityTag::Reply, true, false)]),
        )
    }

    #[tokio::test]
    async fn lists_conversations_and_messages() {
        let dir = TempDir::new().unwrap();
        let adapter = adapter(write_document(&dir));

        let conversations = adapter.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].id.as_str(), "mail:t-1");
        assert_eq!(conversations[1].display_title(), "Bob");

        let messages = adapter.list_messages(&conversations[0]).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].attachments[0].name, "menu.pdf");
        assert!(adapter.list_messages(&conversations[1]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_conversation_is_invalid_reference() {
        let dir = TempDir::new().unwrap();
        let adapter = adapter(write_document(&dir));
        let mut foreign = adapter.list_conversations().await.unwrap().remove(0);
        foreign.provider_ref = ProviderRef::new(ProviderId::from("sms"), "t-1");
        foreign.id = ConversationId::from("sms:t-1");

        let err = adapter.list_messages(&foreign).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidReference { .. }));
        let err = adapter.send(&foreign, "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidReference { .. }));
    }

    #[tokio::test]
    async fn send_appends_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = write_document(&dir);
        let adapter = adapter(path.clone());
        let conversation = adapter.list_conversations().await.unwrap().remove(0);

        adapter.send(&conversation, "see you <there> & then").await.unwrap();

        let reloaded = FixtureAdapter::new(
            ProviderId::from("mail"),
            path,
            "Alice",
            CapabilityTable::default(),
        );
        let messages = reloaded.list_messages(&conversation).await.unwrap();
        assert_eq!(messages.len(), 2);
        let sent = &messages[1];
        assert_eq!(sent.author, "Alice");
        assert_eq!(normalize_str(&sent.content), "see you <there> & then");
        assert_ne!(sent.id, messages[0].id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reads_stay_consistent_while_sending() {
        let dir = TempDir::new().unwrap();
        let adapter = Arc::new(adapter(write_document(&dir)));
        let conversations = adapter.list_conversations().await.unwrap();
        let target = conversations[0].clone();
        let other = conversations[1].clone();

        let reader = {
            let adapter = adapter.clone();
            tokio::spawn(async move {
                let mut failures = Vec::new();
                for _ in 0..200 {
                    if let Err(err) = adapter.list_messages(&other).await {
                        failures.push(err.to_string());
                    }
                    tokio::task::yield_now().await;
                }
                failures
            })
        };
        for n in 0..50 {
            adapter.send(&target, &format!("update {n}")).await.unwrap();
        }
        let failures = reader.await.unwrap();

        assert!(failures.is_empty(), "reads failed during sends: {failures:?}");
        let messages = adapter.list_messages(&target).await.unwrap();
        assert_eq!(messages.len(), 51);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("fixture.json")]);
    }

    #[tokio::test]
    async fn overlong_text_is_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let path = write_document(&dir);
        let before = std::fs::read_to_string(&path).unwrap();
        let adapter = adapter(path.clone()).with_max_text_len(Some(5));
        let conversation = adapter.list_conversations().await.unwrap().remove(0);

        let err = adapter.send(&conversation, "too long").await.unwrap_err();
        assert!(matches!(err, ProviderError::SendRejected { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let adapter = adapter(dir.path().join("absent.json"));
        let err = adapter.list_conversations().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_document_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = adapter(path).list_conversations().await.unwrap_err();
        assert!(matches!(err, ProviderError::ProviderUnavailable { .. }));
    }

    #[test]
    fn capabilities_follow_table() {
        let adapter = adapter(PathBuf::from("unused.json"));
        assert!(adapter.has_capability(&CapabilityTag::Reply, true));
        assert!(!adapter.has_capability(&CapabilityTag::Reply, false));
        assert!(!adapter.has_capability(&CapabilityTag::Subject, true));
    }

    #[test]
    fn registry_builds_with_manifest_defaults() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry).unwrap();
        let adapter = registry
            .build(&ProviderConfig::new(
                "mail",
                "fixture",
                json!({ "path": "mail.json", "account_name": "Alice" }),
            ))
            .unwrap();
        assert!(adapter.has_capability(&CapabilityTag::Reply, false));
        assert!(!adapter.has_capability(&CapabilityTag::Attachments, true));
    }

    #[test]
    fn registry_rejects_missing_account_name() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry).unwrap();
        let err = registry
            .build(&ProviderConfig::new(
                "mail",
                "fixture",
                json!({ "path": "mail.json", "account_name": " " }),
            ))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::InvalidSettings { .. }));
    }
}
