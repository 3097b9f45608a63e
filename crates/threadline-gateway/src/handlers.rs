// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON request handlers.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use threadline_core::{Attachment, Conversation, HealthStatus, Message};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for `POST /v1/conversations`.
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub business_id: i64,
    pub agent_id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

/// Request body for both message submit routes.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    /// Provider file references, already uploaded.
    #[serde(default)]
    pub files: Vec<Attachment>,
}

/// Response body for `POST .../messages/stream`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: Message,
    pub stream_token: String,
    pub stream_url: String,
}

/// Response body for `POST .../messages`.
#[derive(Debug, Serialize)]
pub struct SyncReplyResponse {
    pub user_message: Message,
    pub ai_message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
}

/// GET /health
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let (status, storage) = match state.health.store.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {reason}"))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {}", e.kind())),
    };
    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "unavailable" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage,
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /v1/conversations
pub async fn post_conversation(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let conversation = state
        .service
        .create_conversation(&user, body.business_id, body.agent_id, body.title)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /v1/conversations/{id}/messages
pub async fn get_messages(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(conversation_id): Path<i64>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let messages = state.service.list_messages(&user, conversation_id).await?;
    Ok(Json(MessageListResponse { messages }))
}

/// POST /v1/conversations/{id}/messages
///
/// Runs the whole turn before answering. Used when a push channel is not
/// available.
pub async fn post_message(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(conversation_id): Path<i64>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<SyncReplyResponse>, ApiError> {
    let reply = state
        .service
        .send_sync(&user, conversation_id, &body.content, body.files)
        .await?;
    Ok(Json(SyncReplyResponse {
        user_message: reply.user_message,
        ai_message: reply.ai_message,
    }))
}

/// POST /v1/conversations/{id}/messages/stream
///
/// Records the user message and returns the token for `GET /v1/stream/{token}`.
pub async fn post_message_stream(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(conversation_id): Path<i64>,
    Json(body): Json<MessageRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let receipt = state
        .service
        .submit_for_streaming(&user, conversation_id, &body.content, body.files)
        .await?;
    let stream_url = format!("/v1/stream/{}", receipt.stream_token);
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: receipt.message,
            stream_token: receipt.stream_token,
            stream_url,
        }),
    ))
}
