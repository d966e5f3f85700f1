//! Configuration file support

use neuroguide_protocol::ConversationType;
use neuroguide_protocol::backend::{BASE_URL_ENV, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

/// Configuration for neuroguide
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the chat service API
    pub base_url: Option<String>,
    /// Default conversation type (analysis, mapping, assistant)
    pub conversation_type: Option<String>,
    /// Seconds to wait for a connection
    pub connect_timeout_secs: Option<u64>,
    /// Seconds to wait between chunks of a streamed reply
    pub read_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("neuroguide")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("NEUROGUIDE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            conversation_type: Some(ConversationType::default().to_string()),
            connect_timeout_secs: Some(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout_secs: Some(DEFAULT_READ_TIMEOUT_SECS),
        };

        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Resolve the API base URL: flag, then config, then environment
    pub fn base_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.base_url.clone())
            .or_else(|| std::env::var(BASE_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Resolve the conversation type: flag, then config, then the default
    pub fn conversation_type(
        &self,
        flag: Option<ConversationType>,
    ) -> neuroguide_protocol::Result<ConversationType> {
        if let Some(ty) = flag {
            return Ok(ty);
        }
        match &self.conversation_type {
            Some(name) => name.parse(),
            None => Ok(ConversationType::default()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS))
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# neuroguide configuration file
# Place at ~/.config/neuroguide/config.toml (Linux), ~/Library/Application Support/neuroguide/config.toml (Mac)
# or %APPDATA%\neuroguide\config.toml (Windows). NEUROGUIDE_CONFIG_PATH overrides the location.

# Base URL of the chat service (NEUROGUIDE_API_URL is used when unset)
base_url = "http://localhost:8080/api"

# Default conversation type (analysis, mapping, assistant)
conversation_type = "assistant"

# Seconds to wait for a connection
connect_timeout_secs = 10

# Seconds to wait for the next chunk of a streamed reply
read_timeout_secs = 120
"#
}
