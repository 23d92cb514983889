//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, request timeout, last used email and where tokens are
//! kept.
//!
//! Configuration is stored at `~/.config/famsave/config.json`.
//! `FAMSAVE_API_URL` and `FAMSAVE_TIMEOUT_SECS` override the file for the
//! current process only; saving never writes them back.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/cache/data directory paths
const APP_NAME: &str = "famsave";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_URL_ENV: &str = "FAMSAVE_API_URL";
pub const TIMEOUT_ENV: &str = "FAMSAVE_TIMEOUT_SECS";

/// Where the credential pair is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    /// `tokens.json` in the data directory, mode 0600.
    #[default]
    File,
    /// The OS keychain.
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub last_email: Option<String>,
    #[serde(default)]
    pub token_backend: TokenBackend,
    #[serde(skip)]
    env: EnvOverrides,
}

/// Values taken from the environment, kept apart from the persisted fields.
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `FAMSAVE_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.env.api_base_url = Some(url);
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", TIMEOUT_ENV))?;
            if secs == 0 {
                bail!("{} must be at least 1 second", TIMEOUT_ENV);
            }
            self.env.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.env
            .api_base_url
            .as_deref()
            .or(self.api_base_url.as_deref())
            .unwrap_or(DEFAULT_API_BASE_URL)
    }

    /// A zero timeout in the file is treated as unset.
    pub fn request_timeout(&self) -> Duration {
        let secs = self
            .env
            .request_timeout_secs
            .or(self.request_timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// The token store selected by `token_backend`.
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.token_backend {
            TokenBackend::File => Arc::new(FileTokenStore::new(self.data_dir()?)),
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::default()),
        };
        Ok(store)
    }
}
