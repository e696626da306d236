use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chatmux_core::DEFAULT_PREVIEW_MAX_CHARS;
use chatmux_manager::ManagerConfig;
use chatmux_provider_registry::ProviderConfig;
use serde::Deserialize;
use serde_json::Value;

pub const CONFIG_ENV: &str = "CHATMUX_CONFIG";
pub const PREVIEW_ENV: &str = "CHATMUX_PREVIEW_MAX_CHARS";

fn default_preview_max_chars() -> usize {
    DEFAULT_PREVIEW_MAX_CHARS
}

/// Client configuration read from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub local_display_name: String,
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl CliConfig {
    /// Resolves the config path, reads it, applies env overrides, and validates.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = resolve_path(explicit, env::var_os(CONFIG_ENV).map(PathBuf::from))?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config = Self::from_yaml(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.anchor_paths(base);
        }
        config.apply_overrides(env::var(PREVIEW_ENV).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml_bw::from_str(raw)?)
    }

    /// Relative `path` settings are taken relative to the config file.
    fn anchor_paths(&mut self, base: &Path) {
        for provider in &mut self.providers {
            let anchored = match provider.settings.get("path") {
                Some(Value::String(path)) if Path::new(path).is_relative() => {
                    base.join(path).to_string_lossy().into_owned()
                }
                _ => continue,
            };
            provider.settings["path"] = Value::String(anchored);
        }
    }

    fn apply_overrides(&mut self, preview_max_chars: Option<String>) -> Result<()> {
        if let Some(raw) = preview_max_chars {
            self.preview_max_chars = raw
                .trim()
                .parse()
                .with_context(|| format!("{PREVIEW_ENV} must be a positive integer, got `{raw}`"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_display_name.trim().is_empty() {
            bail!("local_display_name must not be empty");
        }
        if self.preview_max_chars == 0 {
            bail!("preview_max_chars must be greater than zero");
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(&provider.id) {
                bail!("provider id `{}` is configured twice", provider.id);
            }
        }
        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            preview_max_chars: self.preview_max_chars,
            local_display_name: self.local_display_name.clone(),
        }
    }
}

fn resolve_path(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = from_env.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("chatmux").join("config.yaml"))
        .ok_or_else(|| anyhow!("no config path given and no user config directory available"))
}
