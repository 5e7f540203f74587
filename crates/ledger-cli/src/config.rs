//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use ledger_core::util::{is_http_url, normalize_text_option};
use ledger_core::{RemoteConfig, SyncConfig, SyncSettings};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub remote: CliRemote,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliRemote {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

/// `LEDGER_CONFIG_PATH`, else `<config dir>/ledger/cli-config.json`
pub fn default_config_path() -> PathBuf {
    if let Some(path) = normalize_text_option(std::env::var("LEDGER_CONFIG_PATH").ok()) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledger")
        .join(CONFIG_FILE_NAME)
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit flag, then `LEDGER_OWNER_ID`, then the stored owner
    pub fn resolve_owner(&self, explicit: Option<i64>) -> Option<i64> {
        explicit
            .or_else(|| {
                normalize_text_option(std::env::var("LEDGER_OWNER_ID").ok())
                    .and_then(|value| value.parse().ok())
            })
            .or(self.owner_id)
    }

    /// Remote settings from the environment, else from the file
    pub fn resolve_remote(&self) -> Option<RemoteConfig> {
        RemoteConfig::from_env().or_else(|| self.remote.to_remote_config())
    }

    pub fn sync_config(&self) -> Result<SyncConfig, String> {
        self.sync.to_config()
    }

    fn normalize(&mut self) {
        self.remote.normalize();
    }
}

impl CliRemote {
    /// Complete remote settings, when both endpoint and key are present
    pub fn to_remote_config(&self) -> Option<RemoteConfig> {
        let base_url = normalize_text_option(self.base_url.clone())?;
        let api_key = normalize_text_option(self.api_key.clone())?;
        let mut config = RemoteConfig::new(base_url, api_key);
        if let Some(collection) = normalize_text_option(self.collection.clone()) {
            config.collection = collection;
        }
        Some(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = normalize_text_option(self.base_url.clone()) {
            if !is_http_url(&url) {
                return Err("remote_url must include http:// or https://".to_string());
            }
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.base_url = normalize_text_option(self.base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.api_key = normalize_text_option(self.api_key.clone());
        self.collection = normalize_text_option(self.collection.clone());
    }
}
