//! Configuration management with validation and defaults
//!
//! Loaded from an optional TOML file, then environment overrides, then CLI
//! flags. The fairness secret is fixed for the lifetime of the process.

use crate::errors::ConfigurationError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, time::Duration};

/// Development fallback; never acceptable in production.
pub const DEV_SECRET: &str = "dev-secret";

/// Full service configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub fairness: FairnessConfig,
    pub gameplay: GameplayConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Upper bound for a single blocking store call
    pub storage_timeout_ms: u64,
    /// Header carrying the authenticated player id from the account gateway
    pub player_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            storage_timeout_ms: 5_000,
            player_header: "x-player-id".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    RocksDb,
    Memory,
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    pub compression_type: CompressionType,
    /// Optimistic transaction retries before reporting contention
    pub max_transaction_attempts: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Snappy,
    Lz4,
    Zstd,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            data_directory: "./DB/dailyrun_data".to_string(),
            write_buffer_size_mb: 64,
            compression_type: CompressionType::Lz4,
            max_transaction_attempts: 8,
        }
    }
}

/// Seed derivation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FairnessConfig {
    pub secret_key: SecretKey,
    /// IANA zone that defines the daily cutover
    pub timezone: String,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            secret_key: SecretKey::new(DEV_SECRET),
            timezone: "Europe/Brussels".to_string(),
        }
    }
}

/// Gameplay limits
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    pub max_transcript_len: usize,
    pub starting_coins: u64,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            max_transcript_len: 256,
            starting_coins: 500,
        }
    }
}

/// Monitoring and logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_level: LogLevel::Info,
        }
    }
}

/// Process-wide HMAC key. Debug output never shows the value.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_dev_default(&self) -> bool {
        self.0 == DEV_SECRET
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl ArcadeConfig {
    /// Load from a TOML file; missing sections fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `SERVER_SECRET`, `DAILYRUN_DATA_DIR` and `DAILYRUN_TIMEZONE`
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("SERVER_SECRET") {
            self.fairness.secret_key = SecretKey::new(secret);
        }
        if let Some(dir) = lookup("DAILYRUN_DATA_DIR") {
            self.storage.data_directory = dir;
        }
        if let Some(tz) = lookup("DAILYRUN_TIMEZONE") {
            self.fairness.timezone = tz;
        }
    }

    /// Configuration for tests and throwaway local runs
    pub fn ephemeral() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                enable_metrics: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.fairness.secret_key.is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "fairness.secret_key".to_string(),
            ));
        }

        self.timezone()?;

        if self.server.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.port".to_string(),
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        if self.server.request_timeout_secs == 0 || self.server.storage_timeout_ms == 0 {
            return Err(ConfigurationError::ValidationFailed(
                "server timeouts must be > 0".to_string(),
            ));
        }

        if self.server.player_header.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "server.player_header".to_string(),
            ));
        }

        if self.gameplay.max_transcript_len == 0 {
            return Err(ConfigurationError::ValidationFailed(
                "gameplay.max_transcript_len must be > 0".to_string(),
            ));
        }

        if self.storage.max_transaction_attempts == 0 {
            return Err(ConfigurationError::ValidationFailed(
                "storage.max_transaction_attempts must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed civil time zone
    pub fn timezone(&self) -> Result<Tz, ConfigurationError> {
        self.fairness
            .timezone
            .parse::<Tz>()
            .map_err(|e| ConfigurationError::InvalidValue {
                field: "fairness.timezone".to_string(),
                value: self.fairness.timezone.clone(),
                reason: e.to_string(),
            })
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.server.storage_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
