//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub reconnect: ReconnectConfig,
}

/// General settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding persisted credentials
    pub data_dir: Option<PathBuf>,
}

/// Remote endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the remote procedure API
    pub api_url: String,

    /// URL of the live channel server
    pub socket_url: String,

    /// Base URL of the picture upload endpoint
    pub upload_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001/api/trpc".to_string(),
            socket_url: "ws://localhost:3001".to_string(),
            upload_url: "http://localhost:3001/api/express".to_string(),
        }
    }
}

/// Chat view settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of messages fetched when a room becomes active
    pub history_length: u32,

    /// Show receive timestamps next to live messages
    pub show_timestamps: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_length: 40,
            show_timestamps: false,
        }
    }
}

/// Live channel reconnect policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Attempts after a lost connection; 0 disables reconnecting
    pub max_attempts: u32,

    /// Delay before the first attempt, doubled for every further attempt
    pub base_delay_ms: u64,

    /// Upper bound for a single delay
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect `attempt` (1-based), or `None` once attempts are exhausted
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Some(Duration::from_millis(delay))
    }
}

impl Config {
    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatbox")
            .join("config.toml")
    }

    /// Get the directory for persisted client state
    pub fn data_dir(&self) -> PathBuf {
        self.general
            .data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("chatbox")))
            .unwrap_or_else(|| std::env::temp_dir().join("chatbox"))
    }

    /// Get the credentials file path
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir().join("credentials.json")
    }
}
