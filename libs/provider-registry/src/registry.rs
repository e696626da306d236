use std::collections::HashMap;
use std::sync::Arc;

use chatmux_core::ProviderId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manifest::{ManifestError, ProviderManifest};
use crate::traits::SharedAdapter;

/// Builds an adapter for one configured account of a provider kind.
pub type AdapterFactory =
    Arc<dyn Fn(&ProviderConfig, &ProviderManifest) -> Result<SharedAdapter, RegistryError> + Send + Sync>;

/// One configured provider account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub kind: String,
    #[serde(default)]
    pub settings: Value,
}

impl ProviderConfig {
    pub fn new(id: impl Into<ProviderId>, kind: impl Into<String>, settings: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            settings,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("provider kind `{0}` already registered")]
    AlreadyRegistered(String),
    #[error("unknown provider kind `{0}`")]
    UnknownKind(String),
    #[error("invalid settings for provider `{provider}`: {reason}")]
    InvalidSettings { provider: ProviderId, reason: String },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl RegistryError {
    pub fn invalid_settings(provider: &ProviderId, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            provider: provider.clone(),
            reason: reason.into(),
        }
    }
}

struct ProviderEntry {
    manifest: ProviderManifest,
    factory: AdapterFactory,
}

/// In-memory registry of provider kinds keyed by manifest kind.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: HashMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend compiled into this crate.
    pub fn bundled() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        #[cfg(feature = "fixture")]
        crate::providers::fixture::register(&mut registry)?;
        #[cfg(feature = "http")]
        crate::providers::http::register(&mut registry)?;
        Ok(registry)
    }

    pub fn register<F>(&mut self, manifest: ProviderManifest, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&ProviderConfig, &ProviderManifest) -> Result<SharedAdapter, RegistryError>
            + Send
            + Sync
            + 'static,
    {
        if self.entries.contains_key(&manifest.kind) {
            return Err(RegistryError::AlreadyRegistered(manifest.kind));
        }
        let entry = ProviderEntry {
            manifest: manifest.clone(),
            factory: Arc::new(factory),
        };
        self.entries.insert(manifest.kind, entry);
        Ok(())
    }

    pub fn manifest(&self, kind: &str) -> Option<&ProviderManifest> {
        self.entries.get(kind).map(|entry| &entry.manifest)
    }

    /// Instantiates the adapter described by `config`.
    pub fn build(&self, config: &ProviderConfig) -> Result<SharedAdapter, RegistryError> {
        let entry = self
            .entries
            .get(&config.kind)
            .ok_or_else(|| RegistryError::UnknownKind(config.kind.clone()))?;
        (entry.factory)(config, &entry.manifest)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}
