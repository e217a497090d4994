//! Configuration for the Nautobot exporter.

use gateway_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Directory holding the OpenConfig YANG modules. Required by `start`.
    #[serde(default)]
    pub openconfig_directory: String,

    /// Metrics endpoint settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Inventory (Nautobot) client settings.
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Status sample cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Which samples are kept in the cache.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address to listen on (default: "0.0.0.0:59100").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Prefix for the exporter's own metrics (default: "gateway_nautobot").
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Identical consecutive server failures tolerated before the process
    /// is terminated.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Delay before re-binding after a server failure (milliseconds).
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_ms: u64,
}

fn default_listen() -> String {
    "0.0.0.0:59100".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "gateway_nautobot".to_string()
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_restart_backoff() -> u64 {
    1000
}

impl MetricsConfig {
    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            prefix: default_prefix(),
            max_consecutive_failures: default_max_consecutive_failures(),
            restart_backoff_ms: default_restart_backoff(),
        }
    }
}

/// Inventory client configuration.
///
/// The base URL and token are read from the environment; missing values are
/// sent as empty strings and surface as authentication failures downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Environment variable holding the Nautobot base URL.
    #[serde(default = "default_url_env")]
    pub url_env: String,

    /// Environment variable holding the Nautobot API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// API path of the interface status resource.
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Upper bound for one synchronization attempt (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_url_env() -> String {
    "NAUTOBOT_URL".to_string()
}

fn default_token_env() -> String {
    "NAUTOBOT_TOKEN".to_string()
}

fn default_status_path() -> String {
    "/api/plugins/gnmi-status/interfaces/".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl InventoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            token_env: default_token_env(),
            status_path: default_status_path(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Status sample cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long to keep samples without updates before expiring (seconds).
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_secs: u64,

    /// Maximum cached series (memory protection).
    #[serde(default = "default_max_series")]
    pub max_series: usize,

    /// How often to run cleanup of stale samples (seconds).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_stale_timeout() -> u64 {
    300 // 5 minutes
}

fn default_max_series() -> usize {
    100_000
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_timeout_secs: default_stale_timeout(),
            max_series: default_max_series(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Sample filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for metric names to include (empty = all).
    #[serde(default)]
    pub include_metrics: Vec<String>,

    /// Glob patterns for metric names to exclude.
    #[serde(default)]
    pub exclude_metrics: Vec<String>,

    /// Only include these targets (empty = all).
    #[serde(default)]
    pub include_targets: Vec<String>,

    /// Exclude these targets.
    #[serde(default)]
    pub exclude_targets: Vec<String>,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// An empty `openconfig_directory` is accepted here and rejected when
    /// the exporter starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.metrics.max_consecutive_failures == 0 {
            return Err(ConfigError::Validation(
                "max_consecutive_failures must be > 0".to_string(),
            ));
        }

        if !self.inventory.status_path.starts_with('/') || !self.inventory.status_path.ends_with('/')
        {
            return Err(ConfigError::Validation(
                "Inventory status_path must start and end with /".to_string(),
            ));
        }

        if self.inventory.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.cache.stale_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "stale_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.cache.max_series == 0 {
            return Err(ConfigError::Validation(
                "max_series must be > 0".to_string(),
            ));
        }

        if self.cache.cleanup_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "cleanup_interval_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The parsed metrics listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.metrics.listen.parse().map_err(|_| {
            ConfigError::Validation(format!("Invalid listen address: {}", self.metrics.listen))
        })
    }
}
