// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the FlowBell notification relay.

use thiserror::Error;

use crate::types::QueueStatus;

/// The primary error type used across all FlowBell adapter traits and pipeline stages.
#[derive(Debug, Error)]
pub enum FlowbellError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Webhook delivery errors (client construction, transport failure).
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A captured notification is malformed and cannot be queued.
    #[error("invalid notification: {0}")]
    InvalidNotification(String),

    /// A queue entry was asked to move along an edge the lifecycle does not allow.
    #[error("queue entry {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i64,
        from: QueueStatus,
        to: QueueStatus,
    },

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FlowbellError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FlowbellError::Storage {
            source: Box::new(err),
        }
    }
}
