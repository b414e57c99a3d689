// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the FlowBell notification relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use flowbell_core::types::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Top-level FlowBell configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FlowbellConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Webhook endpoint defaults and signing.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Delivery worker and retry policy.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// History cleanup schedule.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Queue health thresholds for the dashboard.
    #[serde(default)]
    pub health: HealthConfig,

    /// Device identity reported in payloads.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Icon embedding.
    #[serde(default)]
    pub media: MediaConfig,

    /// Local HTTP API.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "flowbell".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// JSON file used as the secondary preference store.
    #[serde(default = "default_fallback_preferences_path")]
    pub fallback_preferences_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            fallback_preferences_path: default_fallback_preferences_path(),
        }
    }
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("flowbell").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}

fn default_database_path() -> String {
    data_file("flowbell.db")
}

fn default_fallback_preferences_path() -> String {
    data_file("preferences.json")
}

fn default_wal_mode() -> bool {
    true
}

/// Webhook endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Endpoint used when the user has not set one in their preferences.
    #[serde(default)]
    pub default_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Shared secret for HMAC-SHA256 payload signatures. `None` sends unsigned payloads.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Overrides the `User-Agent` header.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            default_url: None,
            timeout_secs: default_timeout_secs(),
            signing_secret: None,
            user_agent: None,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Delivery worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Failed attempts before an entry is marked FAILED.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failure; doubles per failure.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Upper bound on the retry delay.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// How often each worker polls for pending entries.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum entries fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Number of concurrent worker loops.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            workers: default_workers(),
        }
    }
}

impl DeliveryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs(self.backoff_base_secs),
            max_delay: Duration::from_secs(self.backoff_max_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_backoff_max_secs() -> u64 {
    900
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_batch_size() -> u32 {
    25
}

fn default_workers() -> usize {
    1
}

/// History cleanup configuration.
///
/// The retention window itself (`max_history_days`, `auto_delete_enabled`)
/// lives in the user preferences; this only sets how often it is applied.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_cleanup_interval_secs() -> u64 {
    60 * 60
}

/// Thresholds used to classify queue health.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Pending entries at or above which the queue is WARNING.
    #[serde(default = "default_pending_warning")]
    pub pending_warning: u64,

    /// Pending entries at or above which the queue is CRITICAL.
    #[serde(default = "default_pending_critical")]
    pub pending_critical: u64,

    /// Failure rate (0.0-1.0) at or above which the queue is WARNING.
    #[serde(default = "default_failure_rate_warning")]
    pub failure_rate_warning: f64,

    /// Failure rate (0.0-1.0) at or above which the queue is CRITICAL.
    #[serde(default = "default_failure_rate_critical")]
    pub failure_rate_critical: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            pending_warning: default_pending_warning(),
            pending_critical: default_pending_critical(),
            failure_rate_warning: default_failure_rate_warning(),
            failure_rate_critical: default_failure_rate_critical(),
        }
    }
}

fn default_pending_warning() -> u64 {
    50
}

fn default_pending_critical() -> u64 {
    200
}

fn default_failure_rate_warning() -> f64 {
    0.1
}

fn default_failure_rate_critical() -> f64 {
    0.25
}

/// Device identity reported in the `device` payload section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Stable device identifier. Defaults to the host name.
    #[serde(default)]
    pub id: Option<String>,

    /// OS version string. Defaults to the running OS version.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub manufacturer: Option<String>,
}

/// Icon embedding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Inline local `file://` icons as base64 in the `media` section.
    #[serde(default)]
    pub embed_icons: bool,

    /// Icons larger than this are sent by URI only.
    #[serde(default = "default_max_icon_bytes")]
    pub max_icon_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            embed_icons: false,
            max_icon_bytes: default_max_icon_bytes(),
        }
    }
}

fn default_max_icon_bytes() -> u64 {
    64 * 1024
}

/// Local HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on API routes. `None` leaves them open.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    7823
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_from_delivery_config() {
        let config = DeliveryConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(30));
        assert_eq!(policy.max_delay, Duration::from_secs(900));
    }

    #[test]
    fn default_paths_live_under_flowbell() {
        let storage = StorageConfig::default();
        assert!(storage.database_path.ends_with("flowbell.db"));
        assert!(storage.fallback_preferences_path.ends_with("preferences.json"));
    }

    #[test]
    fn webhook_timeout_defaults_to_thirty_seconds() {
        assert_eq!(WebhookConfig::default().timeout(), Duration::from_secs(30));
    }
}
