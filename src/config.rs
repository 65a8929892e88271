//! Configuration management.

use serde::Deserialize;
use std::time::Duration;

use crate::outbox::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_CAP};
use crate::telemetry::LogFormat;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Sync/outbox configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Configuration for the outbox and the delivery worker.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the cloud backoffice, e.g. `https://backoffice.example.com`
    #[serde(default = "default_cloud_base_url")]
    pub cloud_base_url: String,

    /// Shared secret for HMAC-SHA256 request signatures
    #[serde(default)]
    pub signing_secret: String,

    /// Identifier of this POS node, sent as `X-Node-Id`
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Maximum non-deleted events per location before eviction
    #[serde(default = "default_queue_cap")]
    pub queue_cap: i64,

    /// Events fetched per worker cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Interval between worker cycles
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Delivery attempts before an event is dead-lettered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Base retry delay; attempt `n` waits `2^n * base_backoff`
    #[serde(with = "humantime_serde", default = "default_base_backoff")]
    pub base_backoff: Duration,

    /// Ceiling on the retry delay
    #[serde(with = "humantime_serde", default = "default_max_backoff")]
    pub max_backoff: Duration,

    /// Bound on each outbound HTTP call
    #[serde(with = "humantime_serde", default = "default_http_timeout")]
    pub http_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cloud_base_url: default_cloud_base_url(),
            signing_secret: String::new(),
            node_id: default_node_id(),
            queue_cap: default_queue_cap(),
            batch_size: default_batch_size(),
            poll_interval: default_poll_interval(),
            max_attempts: default_max_attempts(),
            base_backoff: default_base_backoff(),
            max_backoff: default_max_backoff(),
            http_timeout: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (json, pretty, compact)
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_cloud_base_url() -> String { "http://localhost:8080".to_string() }
fn default_node_id() -> String { "pos-node-01".to_string() }
fn default_queue_cap() -> i64 { DEFAULT_QUEUE_CAP }
fn default_batch_size() -> i64 { DEFAULT_BATCH_SIZE }
fn default_poll_interval() -> Duration { Duration::from_secs(30) }
fn default_max_attempts() -> i32 { DEFAULT_MAX_ATTEMPTS }
fn default_base_backoff() -> Duration { Duration::from_secs(1) }
fn default_max_backoff() -> Duration { Duration::from_secs(3600) }
fn default_http_timeout() -> Duration { Duration::from_secs(10) }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_log_level() -> String { "info".to_string() }

impl Config {
    /// Load configuration from environment variables (prefix `RELAY__`).
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RELAY").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("RELAY").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let sync = SyncConfig::default();
        assert_eq!(sync.queue_cap, 1000);
        assert_eq!(sync.batch_size, 10);
        assert_eq!(sync.max_attempts, 5);
        assert_eq!(sync.poll_interval, Duration::from_secs(30));
        assert_eq!(sync.base_backoff, Duration::from_secs(1));
        assert_eq!(sync.max_backoff, Duration::from_secs(3600));
        assert_eq!(sync.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_observability_defaults() {
        let obs = ObservabilityConfig::default();
        assert_eq!(obs.log_level, "info");
        assert_eq!(obs.log_format, LogFormat::Json);
    }
}
