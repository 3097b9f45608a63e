// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer token authentication for the JSON routes.
//!
//! Each configured token maps to one user id. The resolved id is attached to
//! the request as an [`AuthUser`] extension. With no tokens configured every
//! request is rejected (fail-closed).

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use threadline_config::model::AuthConfig;
use threadline_core::RelayError;

use crate::error::ApiError;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

/// Token to user resolution.
#[derive(Clone, Default)]
pub struct BearerAuth {
    tokens: Arc<BTreeMap<String, String>>,
}

impl BearerAuth {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self {
            tokens: Arc::new(tokens),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn resolve(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }
}

impl From<&AuthConfig> for BearerAuth {
    fn from(config: &AuthConfig) -> Self {
        Self::new(config.tokens.clone())
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("tokens", &format!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

/// Resolve `Authorization: Bearer <token>` to an [`AuthUser`].
pub async fn auth_middleware(
    State(auth): State<BearerAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if auth.is_empty() {
        tracing::error!("gateway has no auth tokens configured -- rejecting request");
        return Err(RelayError::unauthorized("authentication required").into());
    }

    let user = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| auth.resolve(token))
        .map(|user| AuthUser(user.to_string()));

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => Err(RelayError::unauthorized("authentication required").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router, middleware};
    use tower::ServiceExt;

    fn app(auth: BearerAuth) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|Extension(AuthUser(user)): Extension<AuthUser>| async move { user }),
            )
            .route_layer(middleware::from_fn_with_state(auth, auth_middleware))
    }

    fn request(token: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn alice() -> BearerAuth {
        BearerAuth::new(BTreeMap::from([("tok-alice".to_string(), "alice".to_string())]))
    }

    #[tokio::test]
    async fn known_token_resolves_user() {
        let response = app(alice()).oneshot(request(Some("tok-alice"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"alice");
    }

    #[tokio::test]
    async fn unknown_or_missing_token_is_rejected() {
        let response = app(alice()).oneshot(request(Some("nope"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(alice()).oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_token_map_fails_closed() {
        let response = app(BearerAuth::default())
            .oneshot(request(Some("anything")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn debug_redacts_tokens() {
        let debug = format!("{:?}", alice());
        assert!(!debug.contains("tok-alice"));
        assert!(debug.contains("redacted"));
    }
}
