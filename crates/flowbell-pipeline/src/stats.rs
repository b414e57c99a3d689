// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only statistics over the delivery queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use flowbell_config::model::HealthConfig;
use flowbell_core::types::{AppFailureCount, StatusCounts};
use flowbell_core::{FlowbellError, QueueStore};

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Coarse health of the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueHealth {
    Healthy,
    Warning,
    Critical,
}

/// `sent / (sent + failed)`, 0 when nothing has finished.
pub fn success_rate(counts: &StatusCounts) -> f64 {
    let finished = counts.sent + counts.failed;
    if finished == 0 {
        0.0
    } else {
        counts.sent as f64 / finished as f64
    }
}

/// `failed / (sent + failed)`, 0 when nothing has finished.
pub fn failure_rate(counts: &StatusCounts) -> f64 {
    let finished = counts.sent + counts.failed;
    if finished == 0 {
        0.0
    } else {
        counts.failed as f64 / finished as f64
    }
}

/// Relative change from `previous` to `current`. A previous count of 0
/// yields 0 rather than infinity.
pub fn weekly_trend(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        0.0
    } else {
        (current as f64 - previous as f64) / previous as f64
    }
}

pub fn classify_health(counts: &StatusCounts, thresholds: &HealthConfig) -> QueueHealth {
    let rate = failure_rate(counts);
    if counts.pending >= thresholds.pending_critical || rate >= thresholds.failure_rate_critical {
        QueueHealth::Critical
    } else if counts.pending >= thresholds.pending_warning
        || rate >= thresholds.failure_rate_warning
    {
        QueueHealth::Warning
    } else {
        QueueHealth::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub counts: StatusCounts,
    pub total: u64,
    pub success_rate: f64,
    pub failure_rate: f64,
    /// Notifications posted in the last 7 days.
    pub this_week: u64,
    /// Notifications posted in the 7 days before that.
    pub last_week: u64,
    pub weekly_trend: f64,
    pub top_failing_apps: Vec<AppFailureCount>,
    pub health: QueueHealth,
}

pub struct StatisticsAggregator {
    queue: Arc<dyn QueueStore>,
    thresholds: HealthConfig,
    top_apps: u32,
}

impl StatisticsAggregator {
    pub fn new(queue: Arc<dyn QueueStore>, thresholds: HealthConfig) -> Self {
        Self {
            queue,
            thresholds,
            top_apps: 5,
        }
    }

    pub fn with_top_apps(mut self, top_apps: u32) -> Self {
        self.top_apps = top_apps;
        self
    }

    pub async fn snapshot(&self) -> Result<StatisticsSnapshot, FlowbellError> {
        self.snapshot_at(chrono::Utc::now().timestamp_millis()).await
    }

    /// Snapshot with weekly windows ending at `now_ms`.
    pub async fn snapshot_at(&self, now_ms: i64) -> Result<StatisticsSnapshot, FlowbellError> {
        let counts = self.queue.status_counts().await?;
        let this_week = self.queue.count_between(now_ms - WEEK_MS, now_ms).await?;
        let last_week = self
            .queue
            .count_between(now_ms - 2 * WEEK_MS, now_ms - WEEK_MS)
            .await?;
        let top_failing_apps = self.queue.top_failing_apps(self.top_apps).await?;

        Ok(StatisticsSnapshot {
            total: counts.total(),
            success_rate: success_rate(&counts),
            failure_rate: failure_rate(&counts),
            this_week,
            last_week,
            weekly_trend: weekly_trend(this_week, last_week),
            top_failing_apps,
            health: classify_health(&counts, &self.thresholds),
            counts,
        })
    }
}
