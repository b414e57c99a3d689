// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery worker: claims PENDING entries, posts them, records the outcome.
//!
//! Workers share nothing but the queue store. Several may poll the same
//! store; the PENDING -> PROCESSING claim decides which one delivers an
//! entry. Delivery errors are recorded on the entry and never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flowbell_config::model::{FlowbellConfig, MediaConfig};
use flowbell_core::types::{DeliveryFailure, QueueEntry, QueueStatus, RetryPolicy};
use flowbell_core::{FlowbellError, PreferenceStore, QueueStore};

use crate::client::WebhookClient;
use crate::payload::{self, DeviceInfo, PayloadBuilder};

/// Tally of one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Entries this worker claimed.
    pub claimed: usize,
    pub sent: usize,
    /// Failed attempts put back to PENDING.
    pub retrying: usize,
    pub failed: usize,
    /// Entries another worker claimed first.
    pub lost_claims: usize,
    /// Claimed entries handed back after their outcome could not be stored.
    pub released: usize,
    /// No webhook URL was configured, nothing was touched.
    pub no_endpoint: bool,
}

pub struct DeliveryWorker {
    queue: Arc<dyn QueueStore>,
    preferences: Arc<dyn PreferenceStore>,
    client: WebhookClient,
    builder: PayloadBuilder,
    media: MediaConfig,
    policy: RetryPolicy,
    batch_size: u32,
    poll_interval: Duration,
    default_url: Option<String>,
}

impl DeliveryWorker {
    pub fn new(
        config: &FlowbellConfig,
        queue: Arc<dyn QueueStore>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self, FlowbellError> {
        Ok(Self {
            queue,
            preferences,
            client: WebhookClient::new(&config.webhook)?,
            builder: PayloadBuilder::new(
                DeviceInfo::from_config(&config.device),
                config.webhook.signing_secret.clone(),
            ),
            media: config.media.clone(),
            policy: config.delivery.retry_policy(),
            batch_size: config.delivery.batch_size,
            poll_interval: config.delivery.poll_interval(),
            default_url: config.webhook.default_url.clone(),
        })
    }

    /// The user's webhook URL, or the configured default.
    pub async fn webhook_url(&self) -> Result<Option<String>, FlowbellError> {
        let user_url = self
            .preferences
            .load_user_preferences()
            .await?
            .and_then(|p| p.webhook_url)
            .filter(|u| !u.trim().is_empty());
        Ok(user_url.or_else(|| self.default_url.clone()))
    }

    /// One polling pass over up to `batch_size` due entries, oldest first.
    pub async fn run_once(&self) -> Result<BatchReport, FlowbellError> {
        let mut report = BatchReport::default();

        let Some(url) = self.webhook_url().await? else {
            warn!("no webhook URL configured, leaving entries pending");
            report.no_endpoint = true;
            return Ok(report);
        };

        let entries = self.queue.dequeue_pending(self.batch_size).await?;
        for entry in entries {
            if !self.queue.mark_processing(entry.id).await? {
                debug!(id = entry.id, "entry claimed elsewhere");
                report.lost_claims += 1;
                continue;
            }
            report.claimed += 1;

            match self.deliver_claimed(&entry, &url).await {
                Ok(QueueStatus::Sent) => report.sent += 1,
                Ok(QueueStatus::Pending) => report.retrying += 1,
                Ok(QueueStatus::Failed) => report.failed += 1,
                Ok(QueueStatus::Processing) => {}
                Err(e) => {
                    error!(id = entry.id, error = %e, "failed to record delivery outcome");
                    self.release_claim(entry.id).await;
                    report.released += 1;
                }
            }
        }
        Ok(report)
    }

    /// Put a claimed entry back to PENDING so a later pass picks it up.
    async fn release_claim(&self, id: i64) {
        match self.queue.release(id).await {
            Ok(true) => warn!(id, "released claim after outcome write failed"),
            Ok(false) => debug!(id, "entry already left PROCESSING"),
            Err(e) => error!(
                id,
                error = %e,
                "could not release claim, entry stays PROCESSING until restart"
            ),
        }
    }

    /// Deliver an entry this worker has already claimed and record the result.
    async fn deliver_claimed(
        &self,
        entry: &QueueEntry,
        url: &str,
    ) -> Result<QueueStatus, FlowbellError> {
        let icons = payload::load_icons(entry, &self.media).await;
        let payload = match self.builder.build(entry, icons) {
            Ok(payload) => payload,
            Err(e) => {
                let failure = DeliveryFailure {
                    message: format!("failed to build payload: {e}"),
                    retryable: true,
                    attempt: None,
                };
                return self.queue.mark_failed(entry.id, &failure, &self.policy).await;
            }
        };

        match self.client.deliver(url, &payload).await {
            Ok(attempt) => {
                self.queue.mark_sent(entry.id, &attempt).await?;
                info!(
                    id = entry.id,
                    delivery_id = %payload.id,
                    status = attempt.response_code,
                    duration_ms = attempt.duration_ms,
                    "notification delivered"
                );
                Ok(QueueStatus::Sent)
            }
            Err(failure) => {
                let status = self
                    .queue
                    .mark_failed(entry.id, &failure, &self.policy)
                    .await?;
                warn!(
                    id = entry.id,
                    delivery_id = %payload.id,
                    retry_count = entry.retry_count + 1,
                    retryable = failure.retryable,
                    next = %status,
                    error = failure.message.as_str(),
                    "delivery attempt failed"
                );
                Ok(status)
            }
        }
    }

    /// Poll until `cancel` fires. An in-flight batch always completes.
    pub async fn run(self: Arc<Self>, worker_id: usize, cancel: CancellationToken) {
        info!(worker_id, "delivery worker started");
        loop {
            let mut full_batch = false;
            match self.run_once().await {
                Ok(report) => {
                    if report.claimed > 0 || report.lost_claims > 0 {
                        debug!(worker_id, ?report, "delivery pass complete");
                    }
                    full_batch = report.claimed + report.lost_claims >= self.batch_size as usize;
                }
                Err(e) => error!(worker_id, error = %e, "delivery pass failed"),
            }

            if cancel.is_cancelled() {
                break;
            }
            if full_batch {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!(worker_id, "delivery worker stopped");
    }
}

/// A fixed pool of delivery loops over one worker definition.
pub struct DeliveryPool {
    handles: Vec<JoinHandle<()>>,
}

impl DeliveryPool {
    /// Revert entries stranded in PROCESSING by a previous run, then spawn
    /// `workers` polling loops.
    pub async fn start(
        worker: Arc<DeliveryWorker>,
        workers: usize,
        cancel: CancellationToken,
    ) -> Result<Self, FlowbellError> {
        let recovered = worker.queue.recover_processing().await?;
        if recovered > 0 {
            info!(recovered, "reverted in-flight entries to pending");
        }

        let handles = (0..workers.max(1))
            .map(|worker_id| tokio::spawn(worker.clone().run(worker_id, cancel.clone())))
            .collect();
        Ok(Self { handles })
    }

    /// Wait for every loop to exit.
    pub async fn join(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                error!(error = %e, "delivery worker task panicked");
            }
        }
    }
}
