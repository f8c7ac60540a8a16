//! Configuration loading and management

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use govern_core::ManagerConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Governance timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: u64,
    #[serde(default = "default_health_check_retry")]
    pub health_check_retry: u32,
    #[serde(default = "default_notification_interval_secs")]
    pub notification_interval_secs: u64,
    #[serde(default = "default_notification_timeout_secs")]
    pub notification_timeout_secs: u64,
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,
}

/// Database configuration. When disabled the daemon runs cache-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "console"
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_health_check_interval_secs() -> u64 {
    30
}

fn default_health_check_timeout_secs() -> u64 {
    5
}

fn default_health_check_retry() -> u32 {
    3
}

fn default_notification_interval_secs() -> u64 {
    60
}

fn default_notification_timeout_secs() -> u64 {
    5
}

fn default_event_queue_size() -> usize {
    1000
}

fn default_db_path() -> String {
    "./data/govern.db".to_string()
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval_secs(),
            health_check_timeout_secs: default_health_check_timeout_secs(),
            health_check_retry: default_health_check_retry(),
            notification_interval_secs: default_notification_interval_secs(),
            notification_timeout_secs: default_notification_timeout_secs(),
            event_queue_size: default_event_queue_size(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_db_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            governance: GovernanceConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Translate the file layer into the kernel's runtime configuration
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            server_port: self.server.port,
            health_check_interval: Duration::from_secs(self.governance.health_check_interval_secs),
            health_check_timeout: Duration::from_secs(self.governance.health_check_timeout_secs),
            health_check_retry: self.governance.health_check_retry,
            notification_interval: Duration::from_secs(
                self.governance.notification_interval_secs,
            ),
            notification_timeout: Duration::from_secs(self.governance.notification_timeout_secs),
            event_queue_size: self.governance.event_queue_size,
            ..ManagerConfig::default()
        }
    }
}
