use chatmux_core::CapabilityTable;
use serde::Deserialize;

/// Errors produced while parsing or validating a provider manifest.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("manifest parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("manifest failed validation: {0}")]
    Invalid(String),
}

/// Manifest describing a provider kind and its default feature support.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderManifest {
    pub name: String,
    pub version: String,
    pub kind: String,
    #[serde(default)]
    pub capabilities: CapabilityTable,
    /// Longest outbound text the backend accepts, in characters.
    #[serde(default)]
    pub max_text_len: Option<u32>,
}

impl ProviderManifest {
    /// Parses and validates a manifest from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let manifest: ProviderManifest = serde_json::from_str(content)?;
        manifest.ensure_valid()?;
        Ok(manifest)
    }

    fn ensure_valid(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::Invalid("name must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ManifestError::Invalid("version must not be empty".into()));
        }
        if self.kind.trim().is_empty() {
            return Err(ManifestError::Invalid("kind must not be empty".into()));
        }
        if self.max_text_len == Some(0) {
            return Err(ManifestError::Invalid(
                "max_text_len must be positive".into(),
            ));
        }
        Ok(())
    }
}
