// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Assistants API.
//!
//! Provides [`OpenAiClient`] which handles authentication headers, JSON
//! request/response handling, streaming responses, and transient error retry.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use threadline_core::RelayError;
use tracing::{debug, warn};

use crate::types::ApiErrorResponse;

/// HTTP client for Assistants API communication.
///
/// Retries transient failures (429, 500, 502, 503) up to `max_retries` times.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl OpenAiClient {
    /// Creates a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        api_key: &str,
        beta_header: &str,
        base_url: &str,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| RelayError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "OpenAI-Beta",
            HeaderValue::from_str(beta_header)
                .map_err(|e| RelayError::Config(format!("invalid OpenAI-Beta header value: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .read_timeout(request_timeout)
            .build()
            .map_err(|e| RelayError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Shortens the delay between retries (tests).
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// GET `path` and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RelayError> {
        let response = self.send::<()>(Method::GET, path, None, false).await?;
        decode(response).await
    }

    /// POST `body` as JSON to `path` and decode the JSON body.
    pub async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RelayError> {
        let response = self.send(Method::POST, path, Some(body), false).await?;
        decode(response).await
    }

    /// POST `body` to `path` and return the raw response for SSE consumption.
    ///
    /// A 2xx response that is not `text/event-stream` is a provider error.
    pub async fn post_stream<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, RelayError> {
        let response = self.send(Method::POST, path, Some(body), true).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            return Err(RelayError::provider(format!(
                "unexpected content-type `{content_type}` for run stream"
            )));
        }
        Ok(response)
    }

    /// Send a request, retrying transient statuses. Returns the first 2xx response.
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        streaming: bool,
    ) -> Result<reqwest::Response, RelayError> {
        let url = format!("{}{path}", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, %url, "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let mut request = self.client.request(method.clone(), &url);
            if !streaming {
                request = request.timeout(self.request_timeout);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| RelayError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

            let status = response.status();
            debug!(%status, %method, path, attempt, "provider response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(%status, body = %body, "transient error, will retry");
                last_error = Some(RelayError::provider(format!("API returned {status}: {body}")));
                continue;
            }

            return Err(RelayError::provider(error_message(status, &body)));
        }

        Err(last_error.unwrap_or_else(|| RelayError::provider("request failed after retries")))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RelayError> {
    let body = response.text().await.map_err(|e| RelayError::Provider {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| RelayError::Provider {
        message: format!("failed to parse API response: {e}"),
        source: Some(Box::new(e)),
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "OpenAI API error ({}): {}",
            api_err
                .error
                .code
                .or(api_err.error.type_)
                .unwrap_or_else(|| status.to_string()),
            api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectId;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str, max_retries: u32) -> OpenAiClient {
        OpenAiClient::new(
            "sk-test",
            "assistants=v2",
            base_url,
            Duration::from_secs(5),
            max_retries,
        )
        .unwrap()
        .with_retry_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn sends_auth_and_beta_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("openai-beta", "assistants=v2"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "thread_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 0);
        let created: ObjectId = client
            .post("/threads", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(created.id, "thread_1");
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "run_1"})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 1);
        let run: ObjectId = client.get("/threads/thread_1/runs/run_1").await.unwrap();
        assert_eq!(run.id, "run_1");
    }

    #[tokio::test]
    async fn exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 2);
        let err = client
            .get::<ObjectId>("/threads/thread_1/messages")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Provider { .. }));
        assert!(err.to_string().contains("503"), "got: {err}");
    }

    #[tokio::test]
    async fn surfaces_api_error_body_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Unknown model", "type": "invalid_request_error", "code": "model_not_found"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 3);
        let err = client
            .post::<_, ObjectId>("/assistants", &serde_json::json!({"model": "nope"}))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("model_not_found"), "got: {text}");
        assert!(text.contains("Unknown model"), "got: {text}");
    }

    #[tokio::test]
    async fn malformed_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/t"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 0);
        let err = client.get::<ObjectId>("/threads/t").await.unwrap_err();
        assert!(err.to_string().contains("failed to parse"), "got: {err}");
    }

    #[tokio::test]
    async fn post_stream_requires_event_stream_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "run_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 0);
        let err = client
            .post_stream("/threads/thread_1/runs", &serde_json::json!({"stream": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Provider { .. }));
        assert!(
            err.to_string().contains("unexpected content-type `application/json`"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn post_stream_accepts_event_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("event: done\ndata: [DONE]\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 0);
        let response = client
            .post_stream("/threads/thread_1/runs", &serde_json::json!({"stream": true}))
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    #[test]
    fn transient_statuses() {
        for code in [429, 500, 502, 503] {
            assert!(is_transient_error(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 404, 422] {
            assert!(!is_transient_error(StatusCode::from_u16(code).unwrap()));
        }
    }
}
