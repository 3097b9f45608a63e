// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assistants API request/response types and run-stream payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use threadline_core::{RemoteMessage, RemoteRun, Role, RunFailure, RunStatus};

// --- Requests ---

#[derive(Debug, Clone, Serialize)]
pub struct CreateAssistantRequest {
    pub name: String,
    pub instructions: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateThreadRequest {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// A file reference on a thread message, searchable by the assistant.
#[derive(Debug, Clone, Serialize)]
pub struct MessageAttachment {
    pub file_id: String,
    pub tools: Vec<AttachmentTool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
}

impl AttachmentTool {
    pub fn file_search() -> Self {
        Self {
            tool_type: "file_search",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

// --- Responses ---

/// Any API object of which only the id is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectId {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

impl From<RunObject> for RemoteRun {
    fn from(run: RunObject) -> Self {
        RemoteRun {
            id: run.id,
            thread_id: run.thread_id,
            status: run.status,
            last_error: run.last_error.map(|e| RunFailure {
                code: e.code,
                message: e.message,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    pub data: Vec<MessageObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageObject {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl MessageObject {
    /// Concatenated text of all text parts; other part types are ignored.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.value.as_str()),
                ContentPart::Other => None,
            })
            .collect()
    }

    /// Convert into the provider-neutral snapshot. Unknown roles yield `None`.
    pub fn into_remote(self) -> Option<RemoteMessage> {
        let role: Role = self.role.parse().ok()?;
        let text = self.text();
        Some(RemoteMessage {
            id: self.id,
            role,
            run_id: self.run_id,
            text,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
}

// --- Run stream payloads ---

/// Payload of a `thread.message.delta` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaEvent {
    pub id: String,
    pub delta: MessageDelta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<DeltaPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaPart {
    #[serde(default)]
    pub text: Option<DeltaText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaText {
    #[serde(default)]
    pub value: Option<String>,
}

impl MessageDeltaEvent {
    pub fn text(&self) -> String {
        self.delta
            .content
            .iter()
            .filter_map(|part| part.text.as_ref()?.value.as_deref())
            .collect()
    }
}

// --- Errors ---

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_joins_text_parts_only() {
        let raw = serde_json::json!({
            "id": "msg_1",
            "object": "thread.message",
            "role": "assistant",
            "run_id": "run_1",
            "content": [
                {"type": "text", "text": {"value": "Hi", "annotations": []}},
                {"type": "image_file", "image_file": {"file_id": "file_9"}},
                {"type": "text", "text": {"value": " there!", "annotations": []}}
            ]
        });
        let message: MessageObject = serde_json::from_value(raw).unwrap();
        let remote = message.into_remote().unwrap();
        assert_eq!(remote.text, "Hi there!");
        assert_eq!(remote.role, Role::Assistant);
        assert_eq!(remote.run_id.as_deref(), Some("run_1"));
    }

    #[test]
    fn run_object_maps_last_error() {
        let raw = serde_json::json!({
            "id": "run_1",
            "object": "thread.run",
            "thread_id": "thread_1",
            "status": "failed",
            "last_error": {"code": "rate_limit_exceeded", "message": "slow down"}
        });
        let run: RemoteRun = serde_json::from_value::<RunObject>(raw).unwrap().into();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.last_error.unwrap().code, "rate_limit_exceeded");
    }

    #[test]
    fn run_request_omits_stream_flag_when_polling() {
        let body = serde_json::to_value(CreateRunRequest {
            assistant_id: "asst_1".into(),
            stream: false,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"assistant_id": "asst_1"}));
    }

    #[test]
    fn delta_text_skips_parts_without_value() {
        let raw = serde_json::json!({
            "id": "msg_1",
            "object": "thread.message.delta",
            "delta": {"content": [
                {"index": 0, "type": "text", "text": {"value": "Hel"}},
                {"index": 1, "type": "image_file"}
            ]}
        });
        let event: MessageDeltaEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.text(), "Hel");
    }
}
