// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, threshold ordering, and non-zero intervals.

use crate::diagnostic::ConfigError;
use crate::model::FlowbellConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &FlowbellConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }
    if config.storage.fallback_preferences_path.trim().is_empty() {
        fail("storage.fallback_preferences_path must not be empty".to_string());
    }

    if let Some(url) = &config.webhook.default_url {
        if let Err(reason) = check_webhook_url(url) {
            fail(format!("webhook.default_url {reason}"));
        }
    }
    if config.webhook.timeout_secs == 0 {
        fail("webhook.timeout_secs must be greater than 0".to_string());
    }
    if matches!(&config.webhook.signing_secret, Some(s) if s.is_empty()) {
        fail("webhook.signing_secret must not be empty when set".to_string());
    }

    let delivery = &config.delivery;
    if delivery.max_retries == 0 {
        fail("delivery.max_retries must be at least 1".to_string());
    }
    if delivery.workers == 0 {
        fail("delivery.workers must be at least 1".to_string());
    }
    if delivery.batch_size == 0 {
        fail("delivery.batch_size must be at least 1".to_string());
    }
    if delivery.poll_interval_secs == 0 {
        fail("delivery.poll_interval_secs must be greater than 0".to_string());
    }
    if delivery.backoff_base_secs > delivery.backoff_max_secs {
        fail(format!(
            "delivery.backoff_base_secs ({}) must not exceed delivery.backoff_max_secs ({})",
            delivery.backoff_base_secs, delivery.backoff_max_secs
        ));
    }

    if config.retention.cleanup_interval_secs == 0 {
        fail("retention.cleanup_interval_secs must be greater than 0".to_string());
    }

    let health = &config.health;
    if health.pending_warning >= health.pending_critical {
        fail(format!(
            "health.pending_warning ({}) must be below health.pending_critical ({})",
            health.pending_warning, health.pending_critical
        ));
    }
    for (key, rate) in [
        ("health.failure_rate_warning", health.failure_rate_warning),
        ("health.failure_rate_critical", health.failure_rate_critical),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            fail(format!("{key} must be between 0.0 and 1.0, got {rate}"));
        }
    }
    if health.failure_rate_warning >= health.failure_rate_critical {
        fail(format!(
            "health.failure_rate_warning ({}) must be below health.failure_rate_critical ({})",
            health.failure_rate_warning, health.failure_rate_critical
        ));
    }

    if config.media.embed_icons && config.media.max_icon_bytes == 0 {
        fail("media.max_icon_bytes must be greater than 0 when embed_icons is on".to_string());
    }

    if config.gateway.enabled {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
        if config.gateway.port == 0 {
            fail("gateway.port must not be 0".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that a webhook endpoint is an absolute http(s) URL with a host.
pub fn check_webhook_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("`{raw}` is not a valid URL: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!(
            "`{raw}` must use http or https, not `{}`",
            parsed.scheme()
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("`{raw}` has no host"));
    }
    Ok(())
}
