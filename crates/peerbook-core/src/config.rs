//! Configuration system for peerbook.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PEERBOOK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/peerbook/config.toml
//!   3. ~/.config/peerbook/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerbookConfig {
    pub store: StoreConfig,
    pub scanner: ScannerConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Primary record file. The backup lives next to it with a `.bak` suffix.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Directory swept for log files. Not recursed.
    pub log_dir: PathBuf,
    /// File extension (without the dot) that marks a log file.
    pub extension: String,
    /// Run one sweep right after startup.
    pub scan_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Poll interval for the background syncer.
    pub interval_ms: u64,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("peers.json"),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            log_dir: data_dir().join("logs"),
            extension: "log".to_string(),
            scan_on_start: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("peerbook")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("peerbook")
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

impl PeerbookConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::file_path())
    }

    /// Load from an explicit file path, still applying env overrides.
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            PeerbookConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PEERBOOK_CONFIG")
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
            let text = toml::to_string_pretty(&PeerbookConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply PEERBOOK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("PEERBOOK_STORE__PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = var("PEERBOOK_SCANNER__LOG_DIR") {
            self.scanner.log_dir = PathBuf::from(v);
        }
        if let Some(v) = var("PEERBOOK_SCANNER__EXTENSION") {
            self.scanner.extension = v.trim_start_matches('.').to_string();
        }
        if let Some(v) = var("PEERBOOK_SCANNER__SCAN_ON_START") {
            self.scanner.scan_on_start = v == "true" || v == "1";
        }
        if let Some(v) = var("PEERBOOK_SYNC__INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                self.sync.interval_ms = ms;
            }
        }
    }
}
