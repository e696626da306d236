use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatmux_core::{
    CapabilityTable, CapabilityTag, Conversation, ConversationId, Message, ProviderError,
    ProviderId,
};
use chatmux_provider_registry::{ProviderAdapter, ensure_owned};

use crate::fixtures::{at, message};

#[derive(Default)]
struct Script {
    conversations: Vec<Conversation>,
    messages: HashMap<String, Vec<Message>>,
    list_failure: Option<ProviderError>,
    message_failures: HashMap<String, ProviderError>,
    send_failure: Option<ProviderError>,
    sent: Vec<(ConversationId, String)>,
}

/// In-memory adapter whose answers and failures are set up by the test.
///
/// Successful sends append a message authored by the account name so a re-fetch observes them.
pub struct ScriptedAdapter {
    id: ProviderId,
    account_name: String,
    capabilities: CapabilityTable,
    delay: Option<Duration>,
    message_delay: Option<Duration>,
    script: Mutex<Script>,
    list_calls: AtomicUsize,
    message_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::from(id),
            account_name: "Alice".into(),
            capabilities: CapabilityTable::default(),
            delay: None,
            message_delay: None,
            script: Mutex::new(Script::default()),
            list_calls: AtomicUsize::new(0),
            message_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sleeps before answering every async call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Extra sleep applied to `list_messages` only.
    pub fn with_message_delay(mut self, delay: Duration) -> Self {
        self.message_delay = Some(delay);
        self
    }

    pub fn with_conversation(self, conversation: Conversation) -> Self {
        self.script().conversations.push(conversation);
        self
    }

    pub fn with_messages(self, handle: &str, messages: Vec<Message>) -> Self {
        self.set_messages(handle, messages);
        self
    }

    pub fn failing_list(self, err: ProviderError) -> Self {
        self.set_list_failure(Some(err));
        self
    }

    pub fn failing_send(self, err: ProviderError) -> Self {
        self.script().send_failure = Some(err);
        self
    }

    pub fn set_conversations(&self, conversations: Vec<Conversation>) {
        self.script().conversations = conversations;
    }

    pub fn set_messages(&self, handle: &str, messages: Vec<Message>) {
        self.script().messages.insert(handle.to_string(), messages);
    }

    pub fn set_list_failure(&self, err: Option<ProviderError>) {
        self.script().list_failure = err;
    }

    pub fn set_message_failure(&self, handle: &str, err: Option<ProviderError>) {
        let mut script = self.script();
        match err {
            Some(err) => script.message_failures.insert(handle.to_string(), err),
            None => script.message_failures.remove(handle),
        };
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Texts accepted by `send`, in order.
    pub fn sent(&self) -> Vec<(ConversationId, String)> {
        self.script().sent.clone()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let script = self.script();
        match &script.list_failure {
            Some(err) => Err(err.clone()),
            None => Ok(script.conversations.clone()),
        }
    }

    async fn list_messages(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<Message>, ProviderError> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        ensure_owned(&self.id, conversation)?;
        self.pause().await;
        if let Some(delay) = self.message_delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.script();
        let handle = &conversation.provider_ref.handle;
        if let Some(err) = script.message_failures.get(handle) {
            return Err(err.clone());
        }
        Ok(script.messages.get(handle).cloned().unwrap_or_default())
    }

    async fn send(&self, conversation: &Conversation, text: &str) -> Result<(), ProviderError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        ensure_owned(&self.id, conversation)?;
        self.pause().await;
        let mut script = self.script();
        if let Some(err) = &script.send_failure {
            return Err(err.clone());
        }
        script.sent.push((conversation.id.clone(), text.to_string()));
        let sequence = script.sent.len();
        let thread = script
            .messages
            .entry(conversation.provider_ref.handle.clone())
            .or_default();
        thread.push(message(
            &format!("sent-{sequence}"),
            &self.account_name,
            text,
            at(10_000 + sequence as i64),
        ));
        Ok(())
    }

    fn has_capability(&self, tag: &CapabilityTag, created_by_local_account: bool) -> bool {
        self.capabilities.allows(tag, created_by_local_account)
    }
}
