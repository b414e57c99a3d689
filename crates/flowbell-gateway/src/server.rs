// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server setup and router construction.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use flowbell_config::model::GatewayConfig;
use flowbell_core::{FlowbellError, PluginAdapter, PreferenceStore, QueueStore};
use flowbell_pipeline::{CaptureService, StatisticsAggregator};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub capture: CaptureService,
    pub queue: Arc<dyn QueueStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub stats: Arc<StatisticsAggregator>,
    /// Adapter probed by `/v1/health`.
    pub storage: Arc<dyn PluginAdapter>,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        preferences: Arc<dyn PreferenceStore>,
        stats: StatisticsAggregator,
        storage: Arc<dyn PluginAdapter>,
    ) -> Self {
        Self {
            capture: CaptureService::new(queue.clone(), preferences.clone()),
            queue,
            preferences,
            stats: Arc::new(stats),
            storage,
            start_time: Instant::now(),
        }
    }
}

/// Build the API router. `/v1/health` stays public; every other route
/// requires the bearer token when one is configured.
pub fn build_router(state: GatewayState, bearer_token: Option<String>) -> Router {
    let api = Router::new()
        .route("/v1/notifications", post(handlers::post_notification))
        .route("/v1/queue", get(handlers::list_queue))
        .route("/v1/queue/{id}", get(handlers::get_queue_entry))
        .route("/v1/queue/{id}/retry", post(handlers::retry_queue_entry))
        .route("/v1/stats", get(handlers::get_stats))
        .route(
            "/v1/apps/{package}/forwarding",
            put(handlers::put_app_forwarding),
        );

    let api = match bearer_token {
        Some(bearer_token) => api.route_layer(axum_middleware::from_fn_with_state(
            AuthConfig { bearer_token },
            auth_middleware,
        )),
        None => api,
    };

    let public = Router::new().route("/v1/health", get(handlers::get_health));

    api.merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the gateway and serve until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), FlowbellError> {
    if config.bearer_token.is_none() && !is_loopback(&config.host) {
        tracing::warn!(
            host = config.host.as_str(),
            "gateway is listening beyond loopback without a bearer token"
        );
    }

    let app = build_router(state, config.bearer_token.clone());
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FlowbellError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    info!(addr = addr.as_str(), "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| FlowbellError::Internal(format!("gateway server error: {e}")))?;

    info!("gateway stopped");
    Ok(())
}

fn is_loopback(host: &str) -> bool {
    host == "localhost"
        || host
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use flowbell_config::model::{HealthConfig, StorageConfig};
    use flowbell_core::StorageAdapter;
    use flowbell_core::types::{DeliveryFailure, QueueEntry, RetryPolicy};
    use flowbell_storage::SqliteStorage;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn fixture() -> (Arc<SqliteStorage>, GatewayState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("gateway.db").display().to_string(),
            ..StorageConfig::default()
        });
        storage.initialize().await.unwrap();
        let storage = Arc::new(storage);
        let state = GatewayState::new(
            storage.clone(),
            storage.clone(),
            StatisticsAggregator::new(storage.clone(), HealthConfig::default()),
            storage.clone(),
        );
        (storage, state, dir)
    }

    fn notification_body(package: &str, title: &str) -> Value {
        json!({
            "packageName": package,
            "appName": "Chat",
            "title": title,
            "text": "hello",
            "timestamp": 1_700_000_000_000i64,
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn capture_then_list_and_fetch() {
        let (_storage, state, _dir) = fixture().await;
        let app = build_router(state, None);

        let (status, body) = send(
            app.clone(),
            json_request("POST", "/v1/notifications", &notification_body("com.chat", "hi")),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "queued");
        let id = body["id"].as_i64().unwrap();

        let (status, body) = send(app.clone(), get_request("/v1/queue?status=pending")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);

        let (status, body) = send(app.clone(), get_request(&format!("/v1/queue/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        let entry: QueueEntry = serde_json::from_value(body).unwrap();
        assert_eq!(entry.package_name, "com.chat");

        let (status, _) = send(app, get_request("/v1/queue/9999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_notification_is_unprocessable() {
        let (storage, state, _dir) = fixture().await;
        let app = build_router(state, None);

        let (status, body) = send(
            app,
            json_request("POST", "/v1/notifications", &notification_body(" ", "hi")),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("invalid notification"));
        assert_eq!(storage.status_counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn disabled_app_is_filtered() {
        let (storage, state, _dir) = fixture().await;
        let app = build_router(state, None);

        let (status, body) = send(
            app.clone(),
            json_request(
                "PUT",
                "/v1/apps/com.game/forwarding",
                &json!({"enabled": false, "appName": "Game"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forwardingEnabled"], false);
        assert_eq!(body["appName"], "Game");

        let (status, body) = send(
            app,
            json_request("POST", "/v1/notifications", &notification_body("com.game", "hi")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "filtered");
        assert_eq!(storage.status_counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn retry_only_accepts_failed_entries() {
        let (storage, state, _dir) = fixture().await;
        let app = build_router(state, None);

        let (_, body) = send(
            app.clone(),
            json_request("POST", "/v1/notifications", &notification_body("com.chat", "hi")),
        )
        .await;
        let id = body["id"].as_i64().unwrap();

        let (status, _) = send(
            app.clone(),
            Request::builder()
                .method("POST")
                .uri(format!("/v1/queue/{id}/retry"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        storage.mark_processing(id).await.unwrap();
        storage
            .mark_failed(
                id,
                &DeliveryFailure {
                    message: "HTTP 404".to_string(),
                    retryable: false,
                    attempt: None,
                },
                &RetryPolicy::default(),
            )
            .await
            .unwrap();

        let (status, body) = send(
            app.clone(),
            Request::builder()
                .method("POST")
                .uri(format!("/v1/queue/{id}/retry"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "PENDING");

        let (status, _) = send(
            app,
            Request::builder()
                .method("POST")
                .uri("/v1/queue/4242/retry")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_status_filter_is_rejected() {
        let (_storage, state, _dir) = fixture().await;
        let app = build_router(state, None);
        let (status, body) = send(app, get_request("/v1/queue?status=lost")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("lost"));
    }

    #[tokio::test]
    async fn stats_and_health() {
        let (_storage, state, _dir) = fixture().await;
        let app = build_router(state, None);

        let (status, body) = send(app.clone(), get_request("/v1/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["health"], "HEALTHY");

        let (status, body) = send(app, get_request("/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["queue"], "HEALTHY");
    }

    #[tokio::test]
    async fn bearer_token_guards_api_but_not_health() {
        let (_storage, state, _dir) = fixture().await;
        let app = build_router(state, Some("s3cret".to_string()));

        let (status, _) = send(app.clone(), get_request("/v1/stats")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/v1/stats")
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(app.clone(), wrong).await.0, StatusCode::UNAUTHORIZED);

        let right = Request::builder()
            .uri("/v1/stats")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(app.clone(), right).await.0, StatusCode::OK);

        let (status, _) = send(app, get_request("/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback("127.0.0.1"));
        assert!(is_loopback("::1"));
        assert!(is_loopback("localhost"));
        assert!(!is_loopback("0.0.0.0"));
    }
}
