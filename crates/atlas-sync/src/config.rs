//! # Sync Configuration
//!
//! Configuration for the sync layer.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     ATLAS_DEVICE_ID=abc-123                                             │
//! │     ATLAS_REMOTE_URL=https://hub.example.com                            │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/atlas-pos/sync.toml (Linux)                               │
//! │     ~/Library/Application Support/com.atlas.pos/sync.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     auto-generated device id, conservative timeouts                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Register 1"
//!
//! [remote]
//! base_url = "https://hub.example.com"
//! connect_timeout_secs = 10
//! request_timeout_secs = 30
//!
//! [queue]
//! poll_interval_secs = 30
//! drain_batch_size = 50
//!
//! [pricing]
//! poll_interval_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4). Auto-generated on first run.
    pub id: String,

    /// Human-readable device name (e.g., "Register 1").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "POS Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Remote Endpoint Settings
// =============================================================================

/// Remote system-of-record endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote API (scheme + host, no trailing slash).
    #[serde(default)]
    pub base_url: String,

    /// TCP connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout (seconds). Every remote call is bounded by
    /// this; an elapsed timeout is a retryable transport failure.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Worker Settings
// =============================================================================

/// Sale queue drain behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Interval between periodic drain cycles (seconds). Drains also run
    /// on every enqueue trigger; the timer is the catch-up path.
    #[serde(default = "default_queue_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum queue items processed per drain.
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: u32,
}

fn default_queue_poll_interval() -> u64 {
    30
}

fn default_drain_batch_size() -> u32 {
    50
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            poll_interval_secs: default_queue_poll_interval(),
            drain_batch_size: default_drain_batch_size(),
        }
    }
}

/// Pricing sync behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Interval between pricing sync cycles (seconds).
    #[serde(default = "default_pricing_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_pricing_poll_interval() -> u64 {
    300
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            poll_interval_secs: default_pricing_poll_interval(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Remote endpoint settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Sale queue drain settings.
    #[serde(default)]
    pub queue: QueueSettings,

    /// Pricing sync settings.
    #[serde(default)]
    pub pricing: PricingSettings,
}

impl SyncConfig {
    /// Creates a config with defaults and a generated device id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// Load order (later overrides earlier): defaults, `sync.toml`,
    /// `ATLAS_*` environment variables.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if the load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        if !self.remote.base_url.is_empty()
            && !self.remote.base_url.starts_with("http://")
            && !self.remote.base_url.starts_with("https://")
        {
            return Err(SyncError::InvalidConfig(format!(
                "remote.base_url must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }

        if self.queue.drain_batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "queue.drain_batch_size must be greater than 0".into(),
            ));
        }

        if self.remote.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "remote.request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("ATLAS_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device id from environment");
            self.device.id = id;
        }

        if let Ok(name) = std::env::var("ATLAS_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Ok(url) = std::env::var("ATLAS_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.base_url = url;
        }

        if let Ok(secs) = std::env::var("ATLAS_QUEUE_POLL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.queue.poll_interval_secs = s;
            }
        }

        if let Ok(secs) = std::env::var("ATLAS_PRICING_POLL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.pricing.poll_interval_secs = s;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "atlas", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Returns the device id.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty()); // Auto-generated
        assert_eq!(config.queue.poll_interval_secs, 30);
        assert_eq!(config.queue.drain_batch_size, 50);
        assert_eq!(config.pricing.poll_interval_secs, 300);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.device.id = String::new();
        assert!(config.validate().is_err());

        config.device.id = "test".to_string();
        config.remote.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        config.remote.base_url = "https://hub.example.com".to_string();
        assert!(config.validate().is_ok());

        config.queue.drain_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[remote]"));

        let back: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.device.id, config.device.id);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");

        let mut config = SyncConfig::default();
        config.remote.base_url = "https://hub.example.com".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.device.id, config.device.id);
        assert_eq!(loaded.remote.base_url, "https://hub.example.com");
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let parsed: SyncConfig = toml::from_str(
            r#"
            [remote]
            base_url = "https://hub.example.com"
            "#,
        )
        .unwrap();

        assert!(!parsed.device.id.is_empty());
        assert_eq!(parsed.remote.request_timeout_secs, 30);
        assert_eq!(parsed.queue.drain_batch_size, 50);
    }
}
