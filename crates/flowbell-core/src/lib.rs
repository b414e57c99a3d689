// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the FlowBell notification relay.
//!
//! This crate provides the error type, the queue/preference domain types,
//! and the adapter traits the pipeline is written against. Storage backends
//! implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FlowbellError;
pub use types::{AdapterType, HealthStatus, QueueStatus};

pub use traits::{PluginAdapter, PreferenceStore, QueueStore, StorageAdapter};
