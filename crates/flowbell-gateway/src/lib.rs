// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local HTTP API for FlowBell.
//!
//! Exposes notification capture, queue inspection, user retry, per-app
//! forwarding toggles, and statistics over a small axum router.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{GatewayState, build_router, start_server};
