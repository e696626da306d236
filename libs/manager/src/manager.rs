use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chatmux_core::{
    CapabilityTag, Conversation, ConversationId, DEFAULT_PREVIEW_MAX_CHARS, Message, ProviderId,
    ThreadEntry, preview, sort_conversations, thread_view,
};
use chatmux_provider_registry::SharedAdapter;
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::errors::ManagerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Characters kept in a conversation preview before the truncation marker.
    pub preview_max_chars: usize,
    /// Display name of the person using this client; forwarded to the resolver.
    pub local_display_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            preview_max_chars: DEFAULT_PREVIEW_MAX_CHARS,
            local_display_name: String::new(),
        }
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    /// Thread as re-fetched after the send; `None` when that fetch failed.
    pub messages: Option<Vec<Message>>,
}

#[derive(Default)]
pub struct ManagerBuilder {
    config: ManagerConfig,
    adapters: Vec<SharedAdapter>,
}

impl ManagerBuilder {
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds an adapter; registration order decides which duplicate conversation wins.
    pub fn register(mut self, adapter: SharedAdapter) -> Result<Self, ManagerError> {
        let id = adapter.provider_id();
        if self.adapters.iter().any(|existing| existing.provider_id() == id) {
            return Err(ManagerError::DuplicateProvider(id.clone()));
        }
        self.adapters.push(adapter);
        Ok(self)
    }

    pub fn build(self) -> Manager {
        let by_provider = self
            .adapters
            .iter()
            .enumerate()
            .map(|(idx, adapter)| (adapter.provider_id().clone(), idx))
            .collect();
        Manager {
            config: self.config,
            adapters: self.adapters,
            by_provider,
            conversations: RwLock::new(ConversationCache::default()),
            messages: DashMap::new(),
            previews: DashMap::new(),
            send_locks: DashMap::new(),
        }
    }
}

/// Last merged listing. Until the first listing every id is tracked.
#[derive(Default)]
struct ConversationCache {
    listed: bool,
    items: Vec<Conversation>,
}

impl ConversationCache {
    fn tracks(&self, id: &ConversationId) -> bool {
        !self.listed || self.items.iter().any(|conversation| &conversation.id == id)
    }
}

/// Merges every registered provider behind one surface and owns the caches.
pub struct Manager {
    config: ManagerConfig,
    adapters: Vec<SharedAdapter>,
    by_provider: HashMap<ProviderId, usize>,
    conversations: RwLock<ConversationCache>,
    messages: DashMap<ConversationId, Vec<Message>>,
    previews: DashMap<ConversationId, String>,
    send_locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl Manager {
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn adapter_for(&self, conversation: &Conversation) -> Option<&SharedAdapter> {
        self.by_provider
            .get(conversation.provider())
            .map(|idx| &self.adapters[*idx])
    }

    /// Queries every adapter concurrently and replaces the cached list with the merged result.
    ///
    /// Failing adapters contribute nothing. Duplicate ids keep the first occurrence in
    /// registration order. The result is ordered newest first.
    #[instrument(skip(self), fields(adapters = self.adapters.len()))]
    pub async fn list_conversations(&self) -> Vec<Conversation> {
        let fetches = self.adapters.iter().map(|adapter| async move {
            (adapter.provider_id(), adapter.list_conversations().await)
        });
        let results = join_all(fetches).await;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for (provider, result) in results {
            match result {
                Ok(conversations) => {
                    debug!(provider = %provider, count = conversations.len(), "conversations fetched");
                    for conversation in conversations {
                        if seen.insert(conversation.id.clone()) {
                            merged.push(conversation);
                        } else {
                            debug!(provider = %provider, conversation = %conversation.id, "duplicate conversation dropped");
                        }
                    }
                }
                Err(err) => {
                    warn!(provider = %provider, error = %err, code = err.code(), "provider listing failed");
                }
            }
        }
        sort_conversations(&mut merged);

        // Cache writers check `tracks` under the read guard, so pruning here cannot race them.
        let mut cache = self.conversations.write().await;
        self.messages.retain(|id, _| seen.contains(id));
        self.previews.retain(|id, _| seen.contains(id));
        self.send_locks.retain(|id, _| seen.contains(id));
        cache.listed = true;
        cache.items = merged.clone();
        drop(cache);

        info!(count = merged.len(), "conversation list refreshed");
        merged
    }

    /// Fetches a thread from its owning adapter and caches it. Bodies are returned raw.
    #[instrument(skip(self, conversation), fields(conversation = %conversation.id))]
    pub async fn list_messages(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<Message>, ManagerError> {
        if self.adapters.is_empty() {
            return Ok(Vec::new());
        }
        let adapter = self.adapter_for(conversation).ok_or_else(|| {
            chatmux_core::ProviderError::invalid_reference(conversation.provider(), &conversation.id)
        })?;
        match adapter.list_messages(conversation).await {
            Ok(messages) => {
                let cache = self.conversations.read().await;
                if cache.tracks(&conversation.id) {
                    self.messages
                        .insert(conversation.id.clone(), messages.clone());
                } else {
                    debug!("conversation no longer listed; thread not cached");
                }
                Ok(messages)
            }
            Err(err) => {
                debug!(error = %err, "message fetch failed");
                Err(err.into())
            }
        }
    }

    /// Fetches a thread and renders it with the configured local display name.
    pub async fn thread(&self, conversation: &Conversation) -> Result<Vec<ThreadEntry>, ManagerError> {
        let messages = self.list_messages(conversation).await?;
        Ok(thread_view(
            conversation,
            &messages,
            &self.config.local_display_name,
        ))
    }

    /// Sends `text` and re-fetches the thread.
    ///
    /// Input and capability checks run before any adapter is contacted; nothing is appended
    /// locally.
    #[instrument(skip(self, conversation, text), fields(conversation = ?conversation.map(|c| c.id.as_str())))]
    pub async fn send(
        &self,
        conversation: Option<&Conversation>,
        text: &str,
    ) -> Result<SendOutcome, ManagerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ManagerError::EmptyInput);
        }
        let conversation = conversation.ok_or(ManagerError::NoConversationSelected)?;
        if self.adapters.is_empty() {
            return Ok(SendOutcome {
                messages: Some(Vec::new()),
            });
        }
        if !self.supports(&CapabilityTag::Reply, conversation) {
            return Err(ManagerError::CapabilityDenied {
                capability: CapabilityTag::Reply,
                conversation: conversation.id.clone(),
            });
        }
        let adapter = self.adapter_for(conversation).ok_or_else(|| {
            chatmux_core::ProviderError::invalid_reference(conversation.provider(), &conversation.id)
        })?;

        let lock = self
            .send_locks
            .entry(conversation.id.clone())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        if let Err(err) = adapter.send(conversation, text).await {
            warn!(error = %err, code = err.code(), "send failed");
            return Err(err.into());
        }
        info!(chars = text.chars().count(), "message sent");

        let messages = match self.list_messages(conversation).await {
            Ok(messages) => Some(messages),
            Err(err) => {
                warn!(error = %err, "refresh after send failed");
                None
            }
        };
        Ok(SendOutcome { messages })
    }

    /// Whether the owning adapter offers `tag` for this conversation. Unknown providers answer
    /// `false`.
    pub fn supports(&self, tag: &CapabilityTag, conversation: &Conversation) -> bool {
        let supported = self
            .adapter_for(conversation)
            .is_some_and(|adapter| adapter.has_capability(tag, conversation.created_by_local_account));
        debug!(capability = %tag, conversation = %conversation.id, supported, "capability query");
        supported
    }

    /// Recomputes previews for `conversations` concurrently; returns how many succeeded.
    ///
    /// A failed fetch leaves that conversation's previous preview in place.
    #[instrument(skip(self, conversations), fields(count = conversations.len()))]
    pub async fn refresh_previews(&self, conversations: &[Conversation]) -> usize {
        let fetches = conversations.iter().map(|conversation| async move {
            (conversation, self.list_messages(conversation).await)
        });
        let mut refreshed = 0;
        for (conversation, result) in join_all(fetches).await {
            match result {
                Ok(messages) => {
                    refreshed += 1;
                    let cache = self.conversations.read().await;
                    if !cache.tracks(&conversation.id) {
                        debug!(conversation = %conversation.id, "conversation no longer listed; preview skipped");
                        continue;
                    }
                    match preview(&messages, self.config.preview_max_chars) {
                        Some(text) => {
                            self.previews.insert(conversation.id.clone(), text);
                        }
                        None => {
                            self.previews.remove(&conversation.id);
                        }
                    }
                }
                Err(err) => {
                    warn!(conversation = %conversation.id, error = %err, "preview fetch failed");
                }
            }
        }
        refreshed
    }

    pub async fn cached_conversations(&self) -> Vec<Conversation> {
        self.conversations.read().await.items.clone()
    }

    pub async fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations
            .read()
            .await
            .items
            .iter()
            .find(|conversation| &conversation.id == id)
            .cloned()
    }

    pub fn cached_messages(&self, id: &ConversationId) -> Option<Vec<Message>> {
        self.messages.get(id).map(|entry| entry.value().clone())
    }

    pub fn preview(&self, id: &ConversationId) -> Option<String> {
        self.previews.get(id).map(|entry| entry.value().clone())
    }
}
