// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic purge of old queue entries.
//!
//! Driven by the user's `auto_delete_enabled` and `max_history_days`
//! preferences, re-read on every pass.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use flowbell_core::{FlowbellError, PreferenceStore, QueueStore};

pub struct RetentionTask {
    queue: Arc<dyn QueueStore>,
    preferences: Arc<dyn PreferenceStore>,
    interval: Duration,
}

impl RetentionTask {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        preferences: Arc<dyn PreferenceStore>,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            preferences,
            interval,
        }
    }

    /// Purge once. Returns `None` when auto-delete is switched off.
    pub async fn run_cleanup(&self) -> Result<Option<u64>, FlowbellError> {
        let prefs = self
            .preferences
            .load_user_preferences()
            .await?
            .unwrap_or_default();
        if !prefs.auto_delete_enabled {
            debug!("auto-delete disabled, skipping cleanup");
            return Ok(None);
        }

        let deleted = self.queue.purge_older_than(prefs.max_history_days).await?;
        if deleted > 0 {
            info!(deleted, days = prefs.max_history_days, "purged old queue entries");
        }
        Ok(Some(deleted))
    }

    /// Clean up on every tick until cancelled. The first tick fires immediately.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cleanup().await {
                        error!(error = %e, "retention cleanup failed");
                    }
                }
            }
        }
        debug!("retention task stopped");
    }
}
