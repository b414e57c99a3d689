// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot queue commands: `capture`, `retry`, `purge`, and `toggle`.
//!
//! These work directly against the local database, so they run whether or
//! not `flowbell serve` is up.

use std::path::Path;

use serde::Deserialize;
use tokio::io::AsyncReadExt;

use flowbell_config::FlowbellConfig;
use flowbell_core::types::{AppPreference, CapturedNotification};
use flowbell_core::{FlowbellError, PreferenceStore, QueueStatus, QueueStore, StorageAdapter};
use flowbell_pipeline::preferences::set_app_forwarding;
use flowbell_pipeline::{CaptureOutcome, CaptureService};

use crate::serve::open_stores;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CaptureInput {
    One(CapturedNotification),
    Many(Vec<CapturedNotification>),
}

/// Tally of one `capture` run.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CaptureSummary {
    pub queued: Vec<i64>,
    pub filtered: Vec<String>,
    pub invalid: Vec<String>,
}

/// Run every notification in `input` through the capture path.
///
/// Malformed notifications are tallied and skipped. Storage failures abort.
pub(crate) async fn capture_all(
    service: &CaptureService,
    input: &str,
) -> Result<CaptureSummary, FlowbellError> {
    let notifications = match serde_json::from_str::<CaptureInput>(input) {
        Ok(CaptureInput::One(n)) => vec![n],
        Ok(CaptureInput::Many(ns)) => ns,
        Err(e) => {
            return Err(FlowbellError::InvalidNotification(format!(
                "input is not a notification or a list of notifications: {e}"
            )));
        }
    };

    let mut summary = CaptureSummary::default();
    for notification in &notifications {
        match service.capture(notification).await {
            Ok(CaptureOutcome::Queued { id }) => summary.queued.push(id),
            Ok(CaptureOutcome::Filtered(verdict)) => summary.filtered.push(verdict.to_string()),
            Err(FlowbellError::InvalidNotification(reason)) => summary.invalid.push(reason),
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}

/// Runs the `flowbell capture` command.
pub async fn run_capture(config: &FlowbellConfig, file: Option<&Path>) -> Result<(), FlowbellError> {
    let input = match file {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            FlowbellError::Internal(format!("failed to read {}: {e}", path.display()))
        })?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .map_err(|e| FlowbellError::Internal(format!("failed to read stdin: {e}")))?;
            buf
        }
    };

    let (storage, preferences) = open_stores(config).await?;
    let service = CaptureService::new(storage.clone(), preferences);
    let summary = capture_all(&service, &input).await;
    storage.close().await?;
    let summary = summary?;

    for id in &summary.queued {
        println!("queued #{id}");
    }
    for reason in &summary.filtered {
        println!("filtered: {reason}");
    }
    for reason in &summary.invalid {
        eprintln!("skipped: {reason}");
    }
    println!(
        "{} queued, {} filtered, {} skipped",
        summary.queued.len(),
        summary.filtered.len(),
        summary.invalid.len()
    );
    Ok(())
}

/// Move a FAILED entry back to PENDING, or explain why it cannot move.
pub(crate) async fn retry_entry(queue: &dyn QueueStore, id: i64) -> Result<(), FlowbellError> {
    if queue.retry(id).await? {
        return Ok(());
    }
    let from = queue
        .get_entry(id)
        .await?
        .map(|entry| entry.status)
        .ok_or_else(|| FlowbellError::NotFound(format!("queue entry {id}")))?;
    Err(FlowbellError::InvalidTransition {
        id,
        from,
        to: QueueStatus::Pending,
    })
}

/// Runs the `flowbell retry` command.
pub async fn run_retry(config: &FlowbellConfig, id: i64) -> Result<(), FlowbellError> {
    let (storage, _) = open_stores(config).await?;
    let result = retry_entry(storage.as_ref(), id).await;
    storage.close().await?;
    result?;
    println!("queue entry {id} re-queued");
    Ok(())
}

/// Purge entries older than `days`, or the stored history window when `None`.
pub(crate) async fn purge(
    queue: &dyn QueueStore,
    preferences: &dyn PreferenceStore,
    days: Option<u32>,
) -> Result<(u32, u64), FlowbellError> {
    let days = match days {
        Some(days) => days,
        None => {
            preferences
                .load_user_preferences()
                .await?
                .unwrap_or_default()
                .max_history_days
        }
    };
    let deleted = queue.purge_older_than(days).await?;
    Ok((days, deleted))
}

/// Runs the `flowbell purge` command.
pub async fn run_purge(config: &FlowbellConfig, days: Option<u32>) -> Result<(), FlowbellError> {
    let (storage, preferences) = open_stores(config).await?;
    let result = purge(storage.as_ref(), preferences.as_ref(), days).await;
    storage.close().await?;
    let (days, deleted) = result?;
    println!("deleted {deleted} entries older than {days} days");
    Ok(())
}

/// Runs the `flowbell toggle` command.
pub async fn run_toggle(
    config: &FlowbellConfig,
    package: &str,
    enabled: bool,
) -> Result<(), FlowbellError> {
    let (storage, preferences) = open_stores(config).await?;
    let result: Result<AppPreference, FlowbellError> =
        set_app_forwarding(preferences.as_ref(), package, enabled).await;
    storage.close().await?;
    let pref = result?;
    let state = if pref.forwarding_enabled {
        "enabled"
    } else {
        "disabled"
    };
    println!("forwarding {state} for {}", pref.package_name);
    Ok(())
}
