// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for posting payloads to the user's webhook endpoint.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use flowbell_config::model::WebhookConfig;
use flowbell_config::validation::check_webhook_url;
use flowbell_core::FlowbellError;
use flowbell_core::types::{DeliveryFailure, HttpAttempt};

use crate::payload::WebhookPayload;

pub const SIGNATURE_HEADER: &str = "x-flowbell-signature";
pub const NONCE_HEADER: &str = "x-flowbell-nonce";
pub const DELIVERY_HEADER: &str = "x-flowbell-delivery";

/// Response bodies longer than this are cut before being stored.
const MAX_STORED_BODY_BYTES: usize = 4096;

const METHOD: &str = "POST";

/// Posts webhook payloads and classifies the outcome.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(config: &WebhookConfig) -> Result<Self, FlowbellError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("flowbell/{}", env!("CARGO_PKG_VERSION")));
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(|e| {
                FlowbellError::Config(format!("invalid webhook user agent: {e}"))
            })?,
        );

        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| FlowbellError::Delivery {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { client, timeout })
    }

    /// POST `payload` to `url`.
    ///
    /// Returns the attempt on a 2xx response. Any other outcome is a
    /// [`DeliveryFailure`] saying whether another attempt can help.
    pub async fn deliver(
        &self,
        url: &str,
        payload: &WebhookPayload,
    ) -> Result<HttpAttempt, DeliveryFailure> {
        if let Err(reason) = check_webhook_url(url) {
            return Err(DeliveryFailure {
                message: format!("webhook URL {reason}"),
                retryable: false,
                attempt: None,
            });
        }

        let mut request = self
            .client
            .post(url)
            .json(payload)
            .header(DELIVERY_HEADER, payload.id.to_string())
            .header(NONCE_HEADER, payload.security.nonce.as_str());
        if let Some(signature) = &payload.security.signature {
            request = request.header(SIGNATURE_HEADER, signature.as_str());
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("request timed out after {}s", self.timeout.as_secs())
                } else {
                    format!("request failed: {e}")
                };
                return Err(DeliveryFailure {
                    message,
                    retryable: true,
                    attempt: Some(HttpAttempt {
                        url: url.to_string(),
                        method: METHOD.to_string(),
                        response_code: None,
                        response_body: None,
                        duration_ms: elapsed_ms(started),
                    }),
                });
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => Some(truncate_body(body)),
            Err(e) => {
                debug!(error = %e, "failed to read webhook response body");
                None
            }
        };
        let attempt = HttpAttempt {
            url: url.to_string(),
            method: METHOD.to_string(),
            response_code: Some(status.as_u16()),
            response_body: body,
            duration_ms: elapsed_ms(started),
        };
        debug!(
            url,
            status = status.as_u16(),
            duration_ms = attempt.duration_ms,
            "webhook responded"
        );

        if attempt.is_success() {
            Ok(attempt)
        } else {
            Err(DeliveryFailure {
                message: format!("webhook returned HTTP {}", status.as_u16()),
                retryable: is_retryable_status(status.as_u16()),
                attempt: Some(attempt),
            })
        }
    }
}

/// 4xx responses are final except request timeout and rate limiting.
pub fn is_retryable_status(code: u16) -> bool {
    !(400..500).contains(&code) || code == 408 || code == 429
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_STORED_BODY_BYTES {
        let mut cut = MAX_STORED_BODY_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{DeviceInfo, EmbeddedIcons, PayloadBuilder};
    use flowbell_config::model::DeviceConfig;
    use flowbell_core::types::{NotificationPriority, QueueEntry, QueueStatus};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(secret: Option<&str>) -> WebhookPayload {
        let entry = QueueEntry {
            id: 1,
            package_name: "com.chat".to_string(),
            app_name: "Chat".to_string(),
            app_version: None,
            title: "Hi".to_string(),
            text: "there".to_string(),
            sub_text: None,
            category: None,
            timestamp: 1_700_000_000_000,
            icon_uri: None,
            large_icon_uri: None,
            priority: NotificationPriority::Normal,
            is_ongoing: false,
            is_clearable: true,
            status: QueueStatus::Processing,
            retry_count: 0,
            last_attempt_at: None,
            next_attempt_at: None,
            error_message: None,
            http_url: None,
            http_method: None,
            http_response_code: None,
            http_response_body: None,
            http_duration_ms: None,
        };
        PayloadBuilder::new(
            DeviceInfo::from_config(&DeviceConfig::default()),
            secret.map(str::to_string),
        )
        .build(&entry, EmbeddedIcons::default())
        .unwrap()
    }

    fn client(timeout_secs: u64) -> WebhookClient {
        WebhookClient::new(&WebhookConfig {
            timeout_secs,
            ..WebhookConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn success_returns_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(header_exists(NONCE_HEADER))
            .and(header_exists(DELIVERY_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/hook", server.uri());
        let attempt = client(5).deliver(&url, &payload(None)).await.unwrap();
        assert_eq!(attempt.response_code, Some(200));
        assert_eq!(attempt.response_body.as_deref(), Some("accepted"));
        assert_eq!(attempt.method, "POST");
        assert_eq!(attempt.url, url);
    }

    #[tokio::test]
    async fn body_is_the_payload_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let sent = payload(Some("k"));
        client(5).deliver(&server.uri(), &sent).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let received: WebhookPayload = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(received, sent);
        let signature = requests[0]
            .headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        assert_eq!(signature, sent.security.signature);
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let failure = client(5)
            .deliver(&server.uri(), &payload(None))
            .await
            .unwrap_err();
        assert!(failure.retryable);
        let attempt = failure.attempt.unwrap();
        assert_eq!(attempt.response_code, Some(503));
        assert_eq!(attempt.response_body.as_deref(), Some("busy"));
    }

    #[tokio::test]
    async fn client_errors_are_final_except_408_and_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/slow-down"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let c = client(5);
        let gone = c
            .deliver(&format!("{}/gone", server.uri()), &payload(None))
            .await
            .unwrap_err();
        assert!(!gone.retryable);

        let limited = c
            .deliver(&format!("{}/slow-down", server.uri()), &payload(None))
            .await
            .unwrap_err();
        assert!(limited.retryable);
    }

    #[tokio::test]
    async fn timeout_is_retryable_without_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let failure = client(1)
            .deliver(&server.uri(), &payload(None))
            .await
            .unwrap_err();
        assert!(failure.retryable);
        assert!(failure.message.contains("timed out"), "{}", failure.message);
        assert!(failure.attempt.unwrap().response_code.is_none());
    }

    #[tokio::test]
    async fn malformed_url_is_not_retryable() {
        let failure = client(5)
            .deliver("not a url", &payload(None))
            .await
            .unwrap_err();
        assert!(!failure.retryable);
        assert!(failure.attempt.is_none());
    }

    #[test]
    fn status_classification() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(302));
        assert!(is_retryable_status(408));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(3000);
        let cut = truncate_body(body);
        assert!(cut.len() <= MAX_STORED_BODY_BYTES);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
