// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `flowbell-core::types` for use across
//! adapter trait boundaries. This module re-exports them for convenience
//! within the storage crate.

pub use flowbell_core::types::{
    AppFailureCount, AppPreference, QueueEntry, QueueStatus, StatusCounts, UserPreferences,
};
