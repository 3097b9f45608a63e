// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware as axum_middleware,
    routing::{get, post},
};
use threadline_config::model::ServerConfig;
use threadline_core::{ChatStore, RelayError};
use threadline_relay::ChatService;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{BearerAuth, auth_middleware};
use crate::{handlers, sse};

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Store checked by `/health`.
    pub store: Arc<dyn ChatStore>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<ChatService>,
    pub auth: BearerAuth,
    pub health: HealthState,
}

/// Build the full router.
///
/// - `GET /health`, `GET /metrics` (public)
/// - `GET /v1/stream/{token}` (authenticated by the token itself)
/// - `POST /v1/conversations`
/// - `GET|POST /v1/conversations/{id}/messages`
/// - `POST /v1/conversations/{id}/messages/stream`
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .route("/v1/stream/{token}", get(sse::get_stream))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/conversations", post(handlers::post_conversation))
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::get_messages).post(handlers::post_message),
        )
        .route(
            "/v1/conversations/{id}/messages/stream",
            post(handlers::post_message_stream),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::permissive())
}

/// Request span keyed by the route template. The raw URI is never recorded:
/// `/v1/stream/{token}` carries a live credential in its path.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched");
    tracing::debug_span!(
        "request",
        method = %request.method(),
        route = %route,
        version = ?request.version(),
    )
}

/// Serve the gateway until `shutdown` is cancelled, then drain connections.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| RelayError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
