// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use flowbell_core::types::{
    AppPreference, CapturedNotification, QueueEntry, QueueFilter, QueueStatus,
};
use flowbell_core::{FlowbellError, HealthStatus};
use flowbell_pipeline::CaptureOutcome;
use flowbell_pipeline::preferences::set_app_forwarding;
use flowbell_pipeline::stats::{QueueHealth, StatisticsSnapshot};

use crate::server::GatewayState;

const MAX_PAGE_SIZE: u32 = 500;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A [`FlowbellError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(FlowbellError);

impl From<FlowbellError> for ApiError {
    fn from(err: FlowbellError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FlowbellError::InvalidNotification(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FlowbellError::NotFound(_) => StatusCode::NOT_FOUND,
            FlowbellError::InvalidTransition { .. } => StatusCode::CONFLICT,
            FlowbellError::Config(_) => StatusCode::BAD_REQUEST,
            _ => {
                tracing::error!(error = %self.0, "gateway request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.0.to_string())
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Response body for POST /v1/notifications.
#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureResponse {
    /// `queued` or `filtered`.
    pub status: String,
    pub id: Option<i64>,
    pub reason: Option<String>,
}

/// POST /v1/notifications
pub async fn post_notification(
    State(state): State<GatewayState>,
    Json(notification): Json<CapturedNotification>,
) -> Result<Response, ApiError> {
    let response = match state.capture.capture(&notification).await? {
        CaptureOutcome::Queued { id } => (
            StatusCode::ACCEPTED,
            Json(CaptureResponse {
                status: "queued".to_string(),
                id: Some(id),
                reason: None,
            }),
        ),
        CaptureOutcome::Filtered(verdict) => (
            StatusCode::OK,
            Json(CaptureResponse {
                status: "filtered".to_string(),
                id: None,
                reason: Some(verdict.to_string()),
            }),
        ),
    };
    Ok(response.into_response())
}

/// Query string for GET /v1/queue.
#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    pub status: Option<String>,
    pub package: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueuePage {
    pub entries: Vec<QueueEntry>,
    pub limit: u32,
    pub offset: u32,
}

/// GET /v1/queue
pub async fn list_queue(
    State(state): State<GatewayState>,
    Query(query): Query<QueueQuery>,
) -> Result<Response, ApiError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match QueueStatus::from_str(&raw.to_uppercase()) {
            Ok(status) => Some(status),
            Err(_) => {
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("unknown status `{raw}`"),
                ));
            }
        },
    };
    let defaults = QueueFilter::default();
    let filter = QueueFilter {
        status,
        package_name: query.package.filter(|p| !p.is_empty()),
        limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0),
    };

    let entries = state.queue.list_entries(&filter).await?;
    Ok(Json(QueuePage {
        entries,
        limit: filter.limit,
        offset: filter.offset,
    })
    .into_response())
}

/// GET /v1/queue/{id}
pub async fn get_queue_entry(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> Result<Json<QueueEntry>, ApiError> {
    state
        .queue
        .get_entry(id)
        .await?
        .map(Json)
        .ok_or_else(|| FlowbellError::NotFound(format!("queue entry {id}")).into())
}

/// POST /v1/queue/{id}/retry
pub async fn retry_queue_entry(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    if state.queue.retry(id).await? {
        tracing::info!(id, "queue entry re-queued by user");
        let entry = state.queue.get_entry(id).await?;
        return Ok(Json(entry).into_response());
    }
    Ok(error_response(
        StatusCode::CONFLICT,
        format!("queue entry {id} is not FAILED"),
    ))
}

/// GET /v1/stats
pub async fn get_stats(
    State(state): State<GatewayState>,
) -> Result<Json<StatisticsSnapshot>, ApiError> {
    Ok(Json(state.stats.snapshot().await?))
}

/// Request body for PUT /v1/apps/{package}/forwarding.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingRequest {
    pub enabled: bool,
    #[serde(default)]
    pub app_name: Option<String>,
}

/// PUT /v1/apps/{package}/forwarding
pub async fn put_app_forwarding(
    State(state): State<GatewayState>,
    Path(package): Path<String>,
    Json(body): Json<ForwardingRequest>,
) -> Result<Json<AppPreference>, ApiError> {
    let mut pref = set_app_forwarding(state.preferences.as_ref(), &package, body.enabled).await?;
    if let Some(app_name) = body.app_name.filter(|n| !n.trim().is_empty()) {
        if app_name != pref.app_name {
            pref.app_name = app_name;
            state.preferences.save_app_preference(&pref).await?;
        }
    }
    tracing::info!(package = package.as_str(), enabled = body.enabled, "app forwarding toggled");
    Ok(Json(pref))
}

/// Response body for GET /v1/health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` when storage answers, `degraded` or `unhealthy` otherwise.
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub queue: Option<QueueHealth>,
}

/// GET /v1/health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let status = match state.storage.health_check().await {
        Ok(HealthStatus::Healthy) => "ok".to_string(),
        Ok(HealthStatus::Degraded(reason)) => format!("degraded: {reason}"),
        Ok(HealthStatus::Unhealthy(reason)) => format!("unhealthy: {reason}"),
        Err(e) => format!("unhealthy: {e}"),
    };
    let queue = match state.stats.snapshot().await {
        Ok(snapshot) => Some(snapshot.health),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not read queue statistics");
            None
        }
    };
    let code = if status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.start_time.elapsed().as_secs(),
            queue,
        }),
    )
        .into_response()
}
