//! Application configuration management.
//!
//! Configuration is stored at `~/.config/tokengate/config.json`. A missing
//! file yields defaults; environment variables override file values:
//!
//! - `TOKENGATE_AUTH_URL`: authentication backend base URL
//! - `TOKENGATE_STORE`: `file`, `keyring` or `memory`
//! - `TOKENGATE_STORE_DIR`: directory for the file store
//! - `TOKENGATE_LOG_DIR`: enables file logging
//! - `TOKENGATE_USERNAME`: default login username
//! - `TOKENGATE_PASSWORD`: login password, skipping the prompt
//! - `TOKENGATE_STORE_PASSPHRASE`: encrypts the file store at rest
//!
//! The password and passphrase only ever come from the environment; they are
//! never written back to the config file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::auth::GuardConfig;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "tokengate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory of the data dir holding session entries
const SESSION_DIR: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreKind::File),
            "keyring" => Ok(StoreKind::Keyring),
            "memory" => Ok(StoreKind::Memory),
            other => Err(anyhow::anyhow!("Unknown store kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL; `None` uses the built-in demo backend
    pub auth_base_url: Option<String>,
    pub store: StoreKind,
    pub store_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// `login_destination` and `public_paths`, at the top level of the file
    #[serde(flatten)]
    pub guard: GuardConfig,
    pub last_username: Option<String>,
    pub log_dir: Option<PathBuf>,
    #[serde(skip)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(skip)]
    pub store_passphrase: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_base_url: None,
            store: StoreKind::default(),
            store_dir: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            guard: GuardConfig::default(),
            last_username: None,
            log_dir: None,
            username: None,
            password: None,
            store_passphrase: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
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

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `TOKENGATE_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("TOKENGATE_AUTH_URL") {
            self.auth_base_url = Some(url);
        }
        if let Some(kind) = lookup("TOKENGATE_STORE") {
            self.store = kind.parse().context("Invalid TOKENGATE_STORE")?;
        }
        if let Some(dir) = lookup("TOKENGATE_STORE_DIR") {
            self.store_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("TOKENGATE_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(username) = lookup("TOKENGATE_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = lookup("TOKENGATE_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(passphrase) = lookup("TOKENGATE_STORE_PASSPHRASE") {
            self.store_passphrase = Some(passphrase);
        }
        Ok(())
    }

    /// Directory for file-backed session entries.
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSION_DIR))
    }
}
