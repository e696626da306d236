//! JSON-over-HTTP provider.
//!
//! Expected routes, relative to `base_url`:
//! - `GET  /conversations` → `[ConversationRecord]`
//! - `GET  /conversations/{handle}/messages` → `[Message]`
//! - `POST /conversations/{handle}/messages` with `{ "text": ... }`
//!
//! A `mock://<scenario>` base URL answers locally without touching the network.

use std::sync::Arc;

use async_trait::async_trait;
use chatmux_core::{
    CapabilityTable, CapabilityTag, Conversation, ConversationId, Message, ProviderError,
    ProviderId,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use time::macros::datetime;
use tracing::{debug, warn};

use super::records::ConversationRecord;
use crate::manifest::ProviderManifest;
use crate::registry::{ProviderConfig, ProviderRegistry, RegistryError};
use crate::traits::{ProviderAdapter, SharedAdapter, ensure_owned};

const MANIFEST_STR: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/manifests/http.json"));

/// Overrides every HTTP provider's base URL when set.
pub const BASE_URL_ENV: &str = "CHATMUX_HTTP_BASE_URL";

pub fn register(registry: &mut ProviderRegistry) -> Result<(), RegistryError> {
    let manifest = ProviderManifest::from_json(MANIFEST_STR)?;
    registry.register(manifest, |config, manifest| {
        let settings: HttpSettings = serde_json::from_value(config.settings.clone())
            .map_err(|err| RegistryError::invalid_settings(&config.id, err.to_string()))?;
        let capabilities = settings
            .capabilities
            .unwrap_or_else(|| manifest.capabilities.clone());
        HttpAdapter::new(config.id.clone(), settings.base_url, settings.token, capabilities)
            .map(|adapter| Arc::new(adapter) as SharedAdapter)
            .map_err(|err| RegistryError::invalid_settings(&config.id, err.to_string()))
    })
}

#[derive(Debug, Deserialize)]
struct HttpSettings {
    base_url: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    capabilities: Option<CapabilityTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockScenario {
    Ok,
    Unavailable,
    AuthExpired,
    Rejected,
}

pub struct HttpAdapter {
    id: ProviderId,
    client: reqwest::Client,
    default_base_url: String,
    token: Option<String>,
    capabilities: CapabilityTable,
}

impl HttpAdapter {
    pub fn new(
        id: ProviderId,
        base_url: impl Into<String>,
        token: Option<String>,
        capabilities: CapabilityTable,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chatmux-http-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ProviderError::unavailable(&id, format!("http client: {err}")))?;
        Ok(Self {
            id,
            client,
            default_base_url: base_url.into(),
            token,
            capabilities,
        })
    }

    fn base_url(&self) -> String {
        std::env::var(BASE_URL_ENV).unwrap_or_else(|_| self.default_base_url.clone())
    }

    fn mock_scenario(&self, base: &str) -> Option<Result<MockScenario, ProviderError>> {
        let scenario = base.strip_prefix("mock://")?;
        Some(match scenario.trim_end_matches('/') {
            "ok" => Ok(MockScenario::Ok),
            "unavailable" => Ok(MockScenario::Unavailable),
            "auth-expired" => Ok(MockScenario::AuthExpired),
            "rejected" => Ok(MockScenario::Rejected),
            other => Err(ProviderError::unavailable(
                &self.id,
                format!("unknown mock scenario `{other}`"),
            )),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn messages_url(base: &str, handle: &str) -> String {
        format!(
            "{}/conversations/{}/messages",
            base.trim_end_matches('/'),
            urlencoding::encode(handle)
        )
    }

    /// Maps a non-success status to the provider error taxonomy.
    fn classify(
        &self,
        status: StatusCode,
        body: &str,
        conversation: Option<&ConversationId>,
        sending: bool,
    ) -> ProviderError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ProviderError::auth_expired(&self.id);
        }
        if status == StatusCode::NOT_FOUND
            && let Some(conversation) = conversation
        {
            return ProviderError::invalid_reference(&self.id, conversation);
        }
        let detail = format!("status={} body={}", status.as_u16(), body);
        if sending && status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            ProviderError::rejected(&self.id, detail)
        } else {
            ProviderError::unavailable(&self.id, detail)
        }
    }

    fn mock_failure(&self, scenario: MockScenario) -> Option<ProviderError> {
        match scenario {
            MockScenario::Unavailable => Some(ProviderError::unavailable(&self.id, "mock outage")),
            MockScenario::AuthExpired => Some(ProviderError::auth_expired(&self.id)),
            MockScenario::Ok | MockScenario::Rejected => None,
        }
    }

    fn mock_record() -> ConversationRecord {
        ConversationRecord {
            id: "mock-1".into(),
            subject: Some("Mock thread".into()),
            recipient: None,
            creator: "mock".into(),
            created_at: datetime!(2024-01-01 0:00 UTC),
            created_by_local_account: false,
            messages: vec![Message {
                id: "mock-message-1".into(),
                author: "mock".into(),
                content: "hello from <i>mock</i>".into(),
                sent_at: datetime!(2024-01-01 0:01 UTC),
                attachments: Vec::new(),
            }],
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        conversation: Option<&ConversationId>,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::unavailable(&self.id, format!("read body: {err}")))?;
        if !status.is_success() {
            return Err(self.classify(status, &body, conversation, false));
        }
        serde_json::from_str(&body)
            .map_err(|err| ProviderError::unavailable(&self.id, format!("decode body: {err}")))
    }
}

#[async_trait]
impl ProviderAdapter for HttpAdapter {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ProviderError> {
        let base = self.base_url();
        if let Some(scenario) = self.mock_scenario(&base) {
            let scenario = scenario?;
            if let Some(err) = self.mock_failure(scenario) {
                return Err(err);
            }
            return Ok(vec![Self::mock_record().to_conversation(&self.id)]);
        }

        let url = format!("{}/conversations", base.trim_end_matches('/'));
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|err| ProviderError::unavailable(&self.id, format!("GET {url}: {err}")))?;
        let records: Vec<ConversationRecord> = self.read_json(response, None).await?;
        debug!(provider = %self.id, count = records.len(), "http conversations fetched");
        Ok(records
            .iter()
            .map(|record| record.to_conversation(&self.id))
            .collect())
    }

    async fn list_messages(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<Message>, ProviderError> {
        ensure_owned(&self.id, conversation)?;
        let base = self.base_url();
        if let Some(scenario) = self.mock_scenario(&base) {
            let scenario = scenario?;
            if let Some(err) = self.mock_failure(scenario) {
                return Err(err);
            }
            let record = Self::mock_record();
            if conversation.provider_ref.handle != record.id {
                return Err(ProviderError::invalid_reference(&self.id, &conversation.id));
            }
            return Ok(record.messages);
        }

        let url = Self::messages_url(&base, &conversation.provider_ref.handle);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|err| ProviderError::unavailable(&self.id, format!("GET {url}: {err}")))?;
        self.read_json(response, Some(&conversation.id)).await
    }

    async fn send(&self, conversation: &Conversation, text: &str) -> Result<(), ProviderError> {
        ensure_owned(&self.id, conversation)?;
        let base = self.base_url();
        if let Some(scenario) = self.mock_scenario(&base) {
            let scenario = scenario?;
            if let Some(err) = self.mock_failure(scenario) {
                return Err(err);
            }
            if scenario == MockScenario::Rejected {
                return Err(ProviderError::rejected(&self.id, "mock rejection"));
            }
            return Ok(());
        }

        let url = Self::messages_url(&base, &conversation.provider_ref.handle);
        let response = self
            .request(Method::POST, &url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|err| ProviderError::unavailable(&self.id, format!("POST {url}: {err}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let err = self.classify(status, &body, Some(&conversation.id), true);
        warn!(provider = %self.id, conversation = %conversation.id, error = %err, "http send failed");
        Err(err)
    }

    fn has_capability(&self, tag: &CapabilityTag, created_by_local_account: bool) -> bool {
        self.capabilities.allows(tag, created_by_local_account)
    }
}
