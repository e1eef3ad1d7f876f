//! Application configuration management.
//!
//! Configuration is stored at `~/.config/copit/config.json`. Every field has
//! a default so a missing file is not an error, and the `COPIT_*`
//! environment variables win over what the file says.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "copit";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Encrypted credential file name
const CREDENTIALS_FILE: &str = "credentials.json";

/// Plaintext token file of installs from before the rename, relative to home
const LEGACY_CREDENTIALS_FILE: &str = ".github-file-fetcher/config.json";

const DEFAULT_CLIENT_ID: &str = "Ov23liff7NX2LqQy2sW6";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_AUTH_URL: &str = "https://github.com";
const DEFAULT_SCOPE: &str = "repo";

pub const ENV_CLIENT_ID: &str = "COPIT_CLIENT_ID";
pub const ENV_API_URL: &str = "COPIT_API_URL";
pub const ENV_AUTH_URL: &str = "COPIT_AUTH_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// OAuth app used for the device flow.
    pub client_id: String,
    pub api_base_url: String,
    pub auth_base_url: String,
    pub scope: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            auth_base_url: DEFAULT_AUTH_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

impl Config {
    /// Load the config file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

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

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(id) = non_empty(ENV_CLIENT_ID) {
            self.client_id = id;
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(url) = non_empty(ENV_AUTH_URL) {
            self.auth_base_url = url;
        }
    }

    /// `~/.config/copit`, home of the config, credentials, templates and history.
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn credentials_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CREDENTIALS_FILE))
    }

    /// `~/.github-file-fetcher/config.json`, where older installs kept the
    /// token in plain text.
    pub fn legacy_credentials_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(LEGACY_CREDENTIALS_FILE))
    }

    /// Where the log file lives.
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
