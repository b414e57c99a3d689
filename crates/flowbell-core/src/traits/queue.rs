// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue store contract for notification deliveries.

use async_trait::async_trait;

use crate::error::FlowbellError;
use crate::types::{
    AppFailureCount, CapturedNotification, DeliveryFailure, HttpAttempt, QueueEntry,
    QueueFilter, QueueStatus, RetryPolicy, StatusCounts,
};

/// Persistent queue of notification delivery attempts.
///
/// Implementations are the single shared mutable resource between the
/// capture path and the delivery workers.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Inserts a PENDING entry and returns its id.
    async fn enqueue(&self, notification: &CapturedNotification) -> Result<i64, FlowbellError>;

    /// PENDING entries whose backoff has elapsed, oldest `timestamp` first,
    /// ties broken by id. Does not claim anything.
    async fn dequeue_pending(&self, limit: u32) -> Result<Vec<QueueEntry>, FlowbellError>;

    /// Atomic PENDING -> PROCESSING. Returns `false` if the entry was not PENDING.
    async fn mark_processing(&self, id: i64) -> Result<bool, FlowbellError>;

    /// PROCESSING -> SENT. The attempt must carry a 2xx response code.
    async fn mark_sent(&self, id: i64, attempt: &HttpAttempt) -> Result<(), FlowbellError>;

    /// Records a failed attempt and returns the resulting status
    /// (PENDING for a later retry, or FAILED).
    async fn mark_failed(
        &self,
        id: i64,
        failure: &DeliveryFailure,
        policy: &RetryPolicy,
    ) -> Result<QueueStatus, FlowbellError>;

    /// User-triggered FAILED -> PENDING. Returns `false` if the entry was not FAILED.
    async fn retry(&self, id: i64) -> Result<bool, FlowbellError>;

    /// Deletes entries older than `days`, except in-flight ones. Returns the count.
    async fn purge_older_than(&self, days: u32) -> Result<u64, FlowbellError>;

    /// Reverts every PROCESSING entry to PENDING. Run once before workers start.
    async fn recover_processing(&self) -> Result<u64, FlowbellError>;

    /// Returns a claimed entry to PENDING without counting an attempt.
    /// Returns `false` if the entry was not PROCESSING.
    async fn release(&self, id: i64) -> Result<bool, FlowbellError>;

    async fn get_entry(&self, id: i64) -> Result<Option<QueueEntry>, FlowbellError>;

    /// Newest entries first.
    async fn list_entries(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>, FlowbellError>;

    async fn status_counts(&self) -> Result<StatusCounts, FlowbellError>;

    /// Entries whose notification timestamp is in `[from_ms, to_ms)`.
    async fn count_between(&self, from_ms: i64, to_ms: i64) -> Result<u64, FlowbellError>;

    async fn top_failing_apps(&self, limit: u32) -> Result<Vec<AppFailureCount>, FlowbellError>;
}
