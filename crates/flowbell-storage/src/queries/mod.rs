// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the queue, preference, and statistics tables.

pub mod preferences;
pub mod queue;
pub mod stats;
