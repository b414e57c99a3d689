// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification pipeline for the FlowBell relay.
//!
//! Notifications flow through these stages:
//! - [`capture::CaptureService`] validates events and runs the [`filter`] gate
//! - accepted events are queued as PENDING rows in the [`QueueStore`]
//! - [`worker::DeliveryWorker`] claims rows, builds a [`payload::WebhookPayload`],
//!   and posts it with [`client::WebhookClient`]
//! - [`stats::StatisticsAggregator`] reads the queue for the UI layer
//!
//! [`QueueStore`]: flowbell_core::QueueStore

pub mod capture;
pub mod client;
pub mod filter;
pub mod payload;
pub mod preferences;
pub mod retention;
pub mod shutdown;
pub mod stats;
pub mod worker;

pub use capture::{CaptureOutcome, CaptureService};
pub use client::WebhookClient;
pub use filter::FilterVerdict;
pub use payload::{DeviceInfo, PayloadBuilder, WebhookPayload};
pub use preferences::{JsonFilePreferenceStore, TieredPreferences};
pub use retention::RetentionTask;
pub use stats::{QueueHealth, StatisticsAggregator, StatisticsSnapshot};
pub use worker::{DeliveryPool, DeliveryWorker};
