// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI Assistants provider adapter for the Threadline relay.
//!
//! Implements [`AssistantProvider`] over the thread/run endpoints, both for
//! polling (`retrieve_run` + `latest_message`) and for streamed runs.

pub mod client;
pub mod sse;
pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use threadline_config::model::OpenAiConfig;
use threadline_core::{
    AdapterType, AssistantProvider, AssistantSpec, HealthStatus, PluginAdapter, RelayError,
    RemoteMessage, RemoteRun, RunEventStream, ThreadMessageRequest,
};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{
    AttachmentTool, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest,
    CreateThreadRequest, MessageAttachment, MessageList, ObjectId, RunObject,
};

/// Assistants API provider implementing [`AssistantProvider`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
}

impl OpenAiProvider {
    /// Creates a provider from the `[openai]` configuration section.
    pub fn new(config: &OpenAiConfig) -> Result<Self, RelayError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(
            &api_key,
            &config.beta_header,
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
            config.max_retries,
        )?;
        info!(base_url = %config.base_url, "OpenAI provider initialized");
        Ok(Self { client })
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        // Reachability surfaces on first use.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        debug!("OpenAI provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl AssistantProvider for OpenAiProvider {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String, RelayError> {
        let body = CreateAssistantRequest {
            name: spec.name.clone(),
            instructions: spec.instructions.clone(),
            model: spec.model.clone(),
        };
        let created: ObjectId = self.client.post("/assistants", &body).await?;
        info!(assistant_id = %created.id, name = %spec.name, "created remote assistant");
        Ok(created.id)
    }

    async fn create_thread(
        &self,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, RelayError> {
        let body = CreateThreadRequest {
            metadata: metadata.clone(),
        };
        let created: ObjectId = self.client.post("/threads", &body).await?;
        info!(thread_id = %created.id, "created remote thread");
        Ok(created.id)
    }

    async fn add_message(
        &self,
        thread_id: &str,
        message: &ThreadMessageRequest,
    ) -> Result<String, RelayError> {
        let body = CreateMessageRequest {
            role: "user",
            content: message.content.clone(),
            attachments: message
                .attachments
                .iter()
                .map(|a| MessageAttachment {
                    file_id: a.file_id.clone(),
                    tools: vec![AttachmentTool::file_search()],
                })
                .collect(),
            metadata: message.metadata.clone(),
        };
        let created: ObjectId = self
            .client
            .post(&format!("/threads/{thread_id}/messages"), &body)
            .await?;
        debug!(thread_id, message_id = %created.id, "appended user message");
        Ok(created.id)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RemoteRun, RelayError> {
        let body = CreateRunRequest {
            assistant_id: assistant_id.to_string(),
            stream: false,
        };
        let run: RunObject = self
            .client
            .post(&format!("/threads/{thread_id}/runs"), &body)
            .await?;
        debug!(thread_id, run_id = %run.id, status = %run.status, "run created");
        Ok(run.into())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<RemoteRun, RelayError> {
        let run: RunObject = self
            .client
            .get(&format!("/threads/{thread_id}/runs/{run_id}"))
            .await?;
        Ok(run.into())
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RemoteRun, RelayError> {
        let run: RunObject = self
            .client
            .post(
                &format!("/threads/{thread_id}/runs/{run_id}/cancel"),
                &serde_json::json!({}),
            )
            .await?;
        info!(thread_id, run_id, status = %run.status, "run cancellation requested");
        Ok(run.into())
    }

    async fn latest_message(&self, thread_id: &str) -> Result<Option<RemoteMessage>, RelayError> {
        let list: MessageList = self
            .client
            .get(&format!("/threads/{thread_id}/messages?limit=1&order=desc"))
            .await?;
        Ok(list.data.into_iter().next().and_then(|m| m.into_remote()))
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunEventStream, RelayError> {
        let body = CreateRunRequest {
            assistant_id: assistant_id.to_string(),
            stream: true,
        };
        let response = self
            .client
            .post_stream(&format!("/threads/{thread_id}/runs"), &body)
            .await?;
        debug!(thread_id, "run stream opened");
        Ok(sse::parse_run_stream(response))
    }
}

/// Resolves the API key from config or the `OPENAI_API_KEY` environment variable.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, RelayError> {
    if let Some(key) = config_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        RelayError::Config(
            "OpenAI API key not found. Set openai.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_core::{Attachment, Role, RunStatus};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(&OpenAiConfig {
            api_key: Some("sk-test".into()),
            base_url: server.uri(),
            max_retries: 0,
            ..OpenAiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn resolve_api_key_prefers_config() {
        assert_eq!(resolve_api_key(&Some("sk-cfg".into())).unwrap(), "sk-cfg");
    }

    #[test]
    fn resolve_api_key_never_returns_empty() {
        if let Ok(key) = resolve_api_key(&Some(String::new())) {
            assert!(!key.is_empty());
        }
    }

    #[tokio::test]
    async fn add_message_sends_attachments_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .and(body_json(serde_json::json!({
                "role": "user",
                "content": "Summarize this",
                "attachments": [{"file_id": "file_1", "tools": [{"type": "file_search"}]}],
                "metadata": {"business_id": "3", "conversation_id": "7"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "msg_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let request = ThreadMessageRequest {
            content: "Summarize this".into(),
            attachments: vec![Attachment {
                file_id: "file_1".into(),
                filename: Some("report.pdf".into()),
            }],
            metadata: BTreeMap::from([
                ("conversation_id".to_string(), "7".to_string()),
                ("business_id".to_string(), "3".to_string()),
            ]),
        };
        let id = provider(&server)
            .add_message("thread_1", &request)
            .await
            .unwrap();
        assert_eq!(id, "msg_1");
    }

    #[tokio::test]
    async fn retrieve_run_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "run_1", "object": "thread.run", "thread_id": "thread_1",
                "status": "requires_action", "last_error": null
            })))
            .mount(&server)
            .await;

        let run = provider(&server)
            .retrieve_run("thread_1", "run_1")
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::RequiresAction);
        assert!(run.last_error.is_none());
    }

    #[tokio::test]
    async fn cancel_run_posts_to_cancel_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs/run_1/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "run_1", "object": "thread.run", "thread_id": "thread_1",
                "status": "cancelling", "last_error": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let run = provider(&server)
            .cancel_run("thread_1", "run_1")
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Cancelling);
    }

    #[tokio::test]
    async fn latest_message_requests_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .and(query_param("limit", "1"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [{
                    "id": "msg_2", "role": "assistant", "run_id": "run_1",
                    "content": [{"type": "text", "text": {"value": "Hi there!", "annotations": []}}]
                }]
            })))
            .mount(&server)
            .await;

        let message = provider(&server)
            .latest_message("thread_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.id, "msg_2");
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text, "Hi there!");
    }

    #[tokio::test]
    async fn latest_message_on_empty_thread() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"object": "list", "data": []})),
            )
            .mount(&server)
            .await;

        assert!(
            provider(&server)
                .latest_message("thread_1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn stream_run_requests_stream_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .and(body_json(serde_json::json!({"assistant_id": "asst_1", "stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("event: done\ndata: [DONE]\n\n", "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        use futures::StreamExt;
        let mut stream = provider(&server)
            .stream_run("thread_1", "asst_1")
            .await
            .unwrap();
        assert!(matches!(
            stream.next().await,
            Some(Ok(threadline_core::RunStreamEvent::Done))
        ));
    }
}
