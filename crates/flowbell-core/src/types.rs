// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the capture, storage, and delivery stages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::FlowbellError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Preferences,
    Webhook,
}

// --- Queue lifecycle ---

/// Delivery status of a queue entry.
///
/// The only reachable edges are PENDING -> PROCESSING, PROCESSING -> {SENT,
/// PENDING, FAILED}, and the user-triggered FAILED -> PENDING.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

impl QueueStatus {
    /// Column value persisted in the queue table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
        }
    }

    /// Returns whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Sent)
                | (Self::Processing, Self::Pending)
                | (Self::Processing, Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }
}

/// Priority of a captured notification, persisted by ordinal.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn ordinal(&self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }

    /// Unknown ordinals read back as `Normal`.
    pub fn from_ordinal(ordinal: i64) -> Self {
        match ordinal {
            0 => Self::Low,
            2 => Self::High,
            3 => Self::Urgent,
            _ => Self::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

/// A raw notification event as produced by the platform notification listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedNotification {
    pub package_name: String,
    pub app_name: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sub_text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Post time in epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub icon_uri: Option<String>,
    #[serde(default)]
    pub large_icon_uri: Option<String>,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub is_ongoing: bool,
    #[serde(default = "default_clearable")]
    pub is_clearable: bool,
}

fn default_clearable() -> bool {
    true
}

impl CapturedNotification {
    /// Rejects events that carry nothing worth forwarding.
    pub fn validate(&self) -> Result<(), FlowbellError> {
        if self.package_name.trim().is_empty() {
            return Err(FlowbellError::InvalidNotification(
                "package name is empty".to_string(),
            ));
        }
        if self.title.trim().is_empty() && self.text.trim().is_empty() {
            return Err(FlowbellError::InvalidNotification(format!(
                "notification from {} has neither title nor text",
                self.package_name
            )));
        }
        if self.timestamp < 0 {
            return Err(FlowbellError::InvalidNotification(format!(
                "negative timestamp {}",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// One notification queued for webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: i64,
    pub package_name: String,
    pub app_name: String,
    pub app_version: Option<String>,
    pub title: String,
    pub text: String,
    pub sub_text: Option<String>,
    pub category: Option<String>,
    pub timestamp: i64,
    pub icon_uri: Option<String>,
    pub large_icon_uri: Option<String>,
    pub priority: NotificationPriority,
    pub is_ongoing: bool,
    pub is_clearable: bool,
    pub status: QueueStatus,
    pub retry_count: u32,
    pub last_attempt_at: Option<i64>,
    pub next_attempt_at: Option<i64>,
    pub error_message: Option<String>,
    pub http_url: Option<String>,
    pub http_method: Option<String>,
    pub http_response_code: Option<u16>,
    pub http_response_body: Option<String>,
    pub http_duration_ms: Option<i64>,
}

/// Outcome of one HTTP delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpAttempt {
    pub url: String,
    pub method: String,
    /// `None` when no response arrived (connect error, timeout).
    pub response_code: Option<u16>,
    pub response_body: Option<String>,
    pub duration_ms: i64,
}

impl HttpAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.response_code, Some(code) if (200..300).contains(&code))
    }
}

/// A failed delivery attempt as recorded against a queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub message: String,
    /// Non-retryable failures go straight to FAILED.
    pub retryable: bool,
    pub attempt: Option<HttpAttempt>,
}

/// Retry ceiling and exponential backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(15 * 60),
        }
    }
}

impl RetryPolicy {
    /// A policy with no backoff delay between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the next attempt once `retry_count` failures are recorded.
    ///
    /// `base * 2^(retry_count - 1)`, capped at `max_delay`.
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

/// Filter for paginated queue listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub package_name: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for QueueFilter {
    fn default() -> Self {
        Self {
            status: None,
            package_name: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Number of queue entries in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub sent: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.sent + self.failed
    }
}

/// Failure tally for one source app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppFailureCount {
    pub package_name: String,
    pub app_name: String,
    pub failures: u64,
}

// --- Preferences ---

/// UI theme preference. Stored, never rendered by this service.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// Singleton user configuration row. Last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub theme: Theme,
    pub webhook_url: Option<String>,
    /// Global switch for all forwarding.
    pub forwarding_enabled: bool,
    pub notification_filter_enabled: bool,
    pub filter_keywords: Vec<String>,
    pub excluded_categories: Vec<String>,
    pub max_history_days: u32,
    pub auto_delete_enabled: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            webhook_url: None,
            forwarding_enabled: true,
            notification_filter_enabled: false,
            filter_keywords: Vec::new(),
            excluded_categories: Vec::new(),
            max_history_days: 30,
            auto_delete_enabled: true,
        }
    }
}

/// Per-source-app forwarding toggle and filter words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPreference {
    pub package_name: String,
    pub app_name: String,
    pub forwarding_enabled: bool,
    #[serde(default)]
    pub filter_words: Vec<String>,
}

impl AppPreference {
    /// Preference used for apps the user has never configured.
    pub fn enabled(package_name: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            app_name: app_name.into(),
            forwarding_enabled: true,
            filter_words: Vec::new(),
        }
    }
}
