//! Configuration system for the SRS client.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SRS_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/srs/config.toml
//!   3. ~/.config/srs/config.toml

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::version::MINIMUM_PROTOCOL_VERSION;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub protocol: ProtocolConfig,
    pub client: ClientSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Stable client identifier. Empty = generate one per run.
    pub client_guid: String,
    /// Display name announced to other participants.
    pub name: String,
    /// 0 = spectator, 1 = red, 2 = blue.
    pub coalition: i32,
    pub seat: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Coordination server, `host:port`.
    pub server: String,
    /// Upper bound on a single connection attempt.
    pub connect_timeout_secs: u64,
    /// Disconnect when nothing has been sent for this long.
    pub idle_timeout_secs: u64,
    /// How often the idle timeout is checked.
    pub idle_check_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Servers advertising an older version are rejected.
    pub minimum_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Let the server record this client's transmissions.
    pub allow_recording: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_guid: String::new(),
            name: String::new(),
            coalition: 0,
            seat: 0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:5002".to_string(),
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
            idle_check_interval_ms: 1000,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            minimum_version: MINIMUM_PROTOCOL_VERSION.to_string(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            allow_recording: false,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms.max(1))
    }
}

impl IdentityConfig {
    /// Configured guid, or a freshly generated one.
    pub fn resolve_guid(&self) -> String {
        if self.client_guid.is_empty() {
            generate_guid()
        } else {
            self.client_guid.clone()
        }
    }
}

/// 22 url-safe characters, the length of a base64 short guid.
pub fn generate_guid() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(22)
        .map(char::from)
        .collect()
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("srs")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ClientConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            ClientConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SRS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ClientConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply SRS_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SRS_NETWORK__SERVER") {
            self.network.server = v;
        }
        if let Ok(v) = std::env::var("SRS_NETWORK__IDLE_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.network.idle_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("SRS_IDENTITY__NAME") {
            self.identity.name = v;
        }
        if let Ok(v) = std::env::var("SRS_CLIENT__ALLOW_RECORDING") {
            self.client.allow_recording = v == "true" || v == "1";
        }
    }
}
