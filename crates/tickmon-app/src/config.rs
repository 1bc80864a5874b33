//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Collaborator API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the dashboard backend serving the ticker and
    /// P/L history endpoints.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Market clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Market-state evaluation interval (ms). Default: 2,000.
    #[serde(default = "default_clock_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_clock_poll_interval_ms() -> u64 {
    2_000
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_clock_poll_interval_ms(),
        }
    }
}

/// Subscription registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Subscription refresh interval while the market is open (ms).
    /// Default: 2,000.
    #[serde(default = "default_registry_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Minimum gap between unforced status checks (ms). Default: 30,000.
    #[serde(default = "default_status_throttle_ms")]
    pub status_throttle_ms: u64,
}

fn default_registry_poll_interval_ms() -> u64 {
    2_000
}

fn default_status_throttle_ms() -> u64 {
    30_000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_registry_poll_interval_ms(),
            status_throttle_ms: default_status_throttle_ms(),
        }
    }
}

/// Tracking scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// P/L snapshot period per tracked strategy (ms). Default: 300,000
    /// (5 minutes).
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,
}

fn default_snapshot_interval_ms() -> u64 {
    300_000
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: default_snapshot_interval_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl AppConfig {
    /// Load configuration from file.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("TICKMON_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}
