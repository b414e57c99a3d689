// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::FlowbellError;
use crate::traits::adapter::PluginAdapter;
use crate::traits::preferences::PreferenceStore;
use crate::traits::queue::QueueStore;

/// A persistence backend holding both the delivery queue and preferences.
#[async_trait]
pub trait StorageAdapter: PluginAdapter + QueueStore + PreferenceStore {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), FlowbellError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), FlowbellError>;
}
