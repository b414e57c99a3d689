// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./flowbell.toml` > `~/.config/flowbell/flowbell.toml` > `/etc/flowbell/flowbell.toml`
//! with environment variable overrides via `FLOWBELL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FlowbellConfig;

/// Sections recognised in `FLOWBELL_<SECTION>_<KEY>` variable names.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "webhook",
    "delivery",
    "retention",
    "health",
    "device",
    "media",
    "gateway",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/flowbell/flowbell.toml` (system-wide)
/// 3. `~/.config/flowbell/flowbell.toml` (user XDG config)
/// 4. `./flowbell.toml` (local directory)
/// 5. `FLOWBELL_*` environment variables
pub fn load_config() -> Result<FlowbellConfig, figment::Error> {
    tracing::debug!("loading configuration from standard locations");
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<FlowbellConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FlowbellConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FlowbellConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading configuration file");
    Figment::new()
        .merge(Serialized::defaults(FlowbellConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FlowbellConfig::default()))
        .merge(Toml::file("/etc/flowbell/flowbell.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("flowbell/flowbell.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("flowbell.toml"))
        .merge(env_provider())
}

/// Maps `FLOWBELL_WEBHOOK_SIGNING_SECRET` to `webhook.signing_secret`.
///
/// Only the first underscore after a known section name becomes a dot;
/// `Env::split("_")` would turn `signing_secret` into `signing.secret`.
fn env_provider() -> Env {
    Env::prefixed("FLOWBELL_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
