// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility. The pipeline only
//! ever sees these traits, never a concrete storage type.

pub mod adapter;
pub mod preferences;
pub mod queue;
pub mod storage;

pub use adapter::PluginAdapter;
pub use preferences::PreferenceStore;
pub use queue::QueueStore;
pub use storage::StorageAdapter;
