// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook payload contract and builder.
//!
//! A [`WebhookPayload`] is built fresh for every delivery attempt: the `id`
//! and `security.nonce` change between attempts, the notification content
//! does not. Field names are camelCase and absent optionals serialize as
//! `null`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sysinfo::System;
use tracing::debug;
use uuid::Uuid;

use flowbell_config::model::{DeviceConfig, MediaConfig};
use flowbell_core::FlowbellError;
use flowbell_core::types::QueueEntry;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_ALGORITHM: &str = "HMAC-SHA256";
pub const PLATFORM: &str = "android";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Unique per delivery attempt, unrelated to the queue entry id.
    pub id: Uuid,
    /// ISO-8601 time the notification was posted.
    pub timestamp: String,
    pub app: AppInfo,
    pub notification: NotificationContent,
    pub media: MediaInfo,
    pub device: DeviceInfo,
    pub security: SecurityInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub package_name: String,
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub title: String,
    pub text: String,
    pub sub_text: Option<String>,
    pub priority: String,
    pub is_ongoing: bool,
    pub is_clearable: bool,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub icon_uri: Option<String>,
    pub large_icon_uri: Option<String>,
    pub icon_base64: Option<String>,
    pub large_icon_base64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub platform: String,
    pub version: String,
    pub model: String,
    pub manufacturer: String,
}

impl DeviceInfo {
    /// Configured values win; the rest is filled from the host.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let unknown = || "unknown".to_string();
        Self {
            id: config
                .id
                .clone()
                .or_else(System::host_name)
                .unwrap_or_else(unknown),
            platform: PLATFORM.to_string(),
            version: config
                .version
                .clone()
                .or_else(System::os_version)
                .unwrap_or_else(unknown),
            model: config.model.clone().unwrap_or_else(unknown),
            manufacturer: config.manufacturer.clone().unwrap_or_else(unknown),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityInfo {
    /// Hex HMAC over the payload serialized with this field set to `null`.
    pub signature: Option<String>,
    pub nonce: String,
    pub algorithm: String,
}

/// Base64 icon data loaded for one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedIcons {
    pub icon: Option<String>,
    pub large_icon: Option<String>,
}

/// Builds signed payloads from queue entries.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    device: DeviceInfo,
    signing_secret: Option<String>,
}

impl PayloadBuilder {
    pub fn new(device: DeviceInfo, signing_secret: Option<String>) -> Self {
        Self {
            device,
            signing_secret,
        }
    }

    /// Build a new payload instance with a fresh id and nonce.
    pub fn build(
        &self,
        entry: &QueueEntry,
        icons: EmbeddedIcons,
    ) -> Result<WebhookPayload, FlowbellError> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(entry.timestamp)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut payload = WebhookPayload {
            id: Uuid::new_v4(),
            timestamp,
            app: AppInfo {
                package_name: entry.package_name.clone(),
                name: entry.app_name.clone(),
                version: entry.app_version.clone(),
            },
            notification: NotificationContent {
                title: entry.title.clone(),
                text: entry.text.clone(),
                sub_text: entry.sub_text.clone(),
                priority: entry.priority.as_str().to_string(),
                is_ongoing: entry.is_ongoing,
                is_clearable: entry.is_clearable,
                category: entry.category.clone(),
            },
            media: MediaInfo {
                icon_uri: entry.icon_uri.clone(),
                large_icon_uri: entry.large_icon_uri.clone(),
                icon_base64: icons.icon,
                large_icon_base64: icons.large_icon,
            },
            device: self.device.clone(),
            security: SecurityInfo {
                signature: None,
                nonce: generate_nonce(),
                algorithm: SIGNATURE_ALGORITHM.to_string(),
            },
        };

        if let Some(secret) = &self.signing_secret {
            payload.security.signature = Some(sign(&payload, secret)?);
        }
        Ok(payload)
    }
}

/// 16 random bytes, hex encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn signing_bytes(payload: &WebhookPayload) -> Result<Vec<u8>, FlowbellError> {
    let mut unsigned = payload.clone();
    unsigned.security.signature = None;
    serde_json::to_vec(&unsigned)
        .map_err(|e| FlowbellError::Internal(format!("failed to serialize payload: {e}")))
}

/// Hex HMAC-SHA256 of the payload with its signature cleared.
pub fn sign(payload: &WebhookPayload, secret: &str) -> Result<String, FlowbellError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| FlowbellError::Internal(format!("invalid signing key: {e}")))?;
    mac.update(&signing_bytes(payload)?);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a received payload's signature against `secret`.
pub fn verify_signature(payload: &WebhookPayload, secret: &str) -> bool {
    let Some(signature) = payload.security.signature.as_deref() else {
        return false;
    };
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(bytes) = signing_bytes(payload) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(&bytes);
    mac.verify_slice(&expected).is_ok()
}

/// Load local icons as base64 when embedding is enabled.
pub async fn load_icons(entry: &QueueEntry, media: &MediaConfig) -> EmbeddedIcons {
    if !media.embed_icons {
        return EmbeddedIcons::default();
    }
    EmbeddedIcons {
        icon: load_icon(entry.icon_uri.as_deref(), media.max_icon_bytes).await,
        large_icon: load_icon(entry.large_icon_uri.as_deref(), media.max_icon_bytes).await,
    }
}

/// Only `file://` URIs and absolute paths are read; anything else stays a URI.
async fn load_icon(uri: Option<&str>, max_bytes: u64) -> Option<String> {
    let uri = uri?;
    let path = match uri.strip_prefix("file://") {
        Some(path) => path,
        None if uri.starts_with('/') => uri,
        None => return None,
    };

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > max_bytes => {
            debug!(path, size = meta.len(), max_bytes, "icon too large to embed");
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            debug!(path, error = %e, "icon not readable");
            return None;
        }
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => Some(STANDARD.encode(bytes)),
        Err(e) => {
            debug!(path, error = %e, "icon not readable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbell_core::types::{NotificationPriority, QueueStatus};

    fn entry() -> QueueEntry {
        QueueEntry {
            id: 42,
            package_name: "com.chat".to_string(),
            app_name: "Chat".to_string(),
            app_version: Some("2.1".to_string()),
            title: "Alice".to_string(),
            text: "Lunch?".to_string(),
            sub_text: None,
            category: Some("msg".to_string()),
            timestamp: 1_700_000_000_123,
            icon_uri: Some("content://icons/1".to_string()),
            large_icon_uri: None,
            priority: NotificationPriority::High,
            is_ongoing: false,
            is_clearable: true,
            status: QueueStatus::Processing,
            retry_count: 0,
            last_attempt_at: None,
            next_attempt_at: None,
            error_message: None,
            http_url: None,
            http_method: None,
            http_response_code: None,
            http_response_body: None,
            http_duration_ms: None,
        }
    }

    fn device() -> DeviceInfo {
        DeviceInfo::from_config(&DeviceConfig {
            id: Some("dev-1".to_string()),
            version: Some("14".to_string()),
            model: Some("Pixel 8".to_string()),
            manufacturer: Some("Google".to_string()),
        })
    }

    #[test]
    fn builds_sections_from_entry() {
        let payload = PayloadBuilder::new(device(), None)
            .build(&entry(), EmbeddedIcons::default())
            .unwrap();

        assert_eq!(payload.timestamp, "2023-11-14T22:13:20.123Z");
        assert_eq!(payload.app.package_name, "com.chat");
        assert_eq!(payload.app.version.as_deref(), Some("2.1"));
        assert_eq!(payload.notification.priority, "HIGH");
        assert_eq!(payload.device.platform, "android");
        assert_eq!(payload.device.model, "Pixel 8");
        assert_eq!(payload.security.algorithm, "HMAC-SHA256");
        assert_eq!(payload.security.nonce.len(), 32);
        assert!(payload.security.signature.is_none());
    }

    #[test]
    fn json_uses_camel_case_and_nulls() {
        let payload = PayloadBuilder::new(device(), None)
            .build(&entry(), EmbeddedIcons::default())
            .unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["app"]["packageName"], "com.chat");
        assert_eq!(json["notification"]["isClearable"], true);
        assert!(json["notification"]["subText"].is_null());
        assert!(json["media"]["largeIconUri"].is_null());
        assert!(json["security"]["signature"].is_null());
    }

    #[test]
    fn json_round_trip_preserves_payload() {
        let payload = PayloadBuilder::new(device(), Some("secret".to_string()))
            .build(
                &entry(),
                EmbeddedIcons {
                    icon: Some("aGVsbG8=".to_string()),
                    large_icon: None,
                },
            )
            .unwrap();
        let json = serde_json::to_string(&payload).unwrap();
        let back: WebhookPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn retries_get_fresh_id_and_nonce() {
        let builder = PayloadBuilder::new(device(), None);
        let first = builder.build(&entry(), EmbeddedIcons::default()).unwrap();
        let second = builder.build(&entry(), EmbeddedIcons::default()).unwrap();

        assert_ne!(first.id, second.id);
        assert_ne!(first.security.nonce, second.security.nonce);
        assert_eq!(first.notification, second.notification);
        assert_eq!(first.app, second.app);
    }

    #[test]
    fn signature_verifies_and_detects_tampering() {
        let payload = PayloadBuilder::new(device(), Some("s3cret".to_string()))
            .build(&entry(), EmbeddedIcons::default())
            .unwrap();
        assert!(verify_signature(&payload, "s3cret"));
        assert!(!verify_signature(&payload, "other"));

        let mut tampered = payload.clone();
        tampered.notification.text = "changed".to_string();
        assert!(!verify_signature(&tampered, "s3cret"));
    }

    #[test]
    fn device_defaults_fill_unknowns() {
        let info = DeviceInfo::from_config(&DeviceConfig::default());
        assert_eq!(info.platform, "android");
        assert_eq!(info.model, "unknown");
        assert_eq!(info.manufacturer, "unknown");
        assert!(!info.id.is_empty());
    }

    #[tokio::test]
    async fn embeds_small_local_icons_only() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.png");
        let big = dir.path().join("big.png");
        std::fs::write(&small, b"hello").unwrap();
        std::fs::write(&big, vec![0u8; 64]).unwrap();

        let mut e = entry();
        e.icon_uri = Some(format!("file://{}", small.display()));
        e.large_icon_uri = Some(big.display().to_string());
        let media = MediaConfig {
            embed_icons: true,
            max_icon_bytes: 16,
        };

        let icons = load_icons(&e, &media).await;
        assert_eq!(icons.icon.as_deref(), Some("aGVsbG8="));
        assert!(icons.large_icon.is_none());

        let disabled = MediaConfig {
            embed_icons: false,
            ..media
        };
        assert_eq!(load_icons(&e, &disabled).await, EmbeddedIcons::default());
    }
}
