// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`RelayError`] to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use threadline_core::RelayError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`RelayError`] answered over HTTP.
///
/// Only user-facing errors expose their message. Everything else gets a
/// generic body and is logged in full.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::Input(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RelayError::Auth {
                forbidden: true, ..
            } => StatusCode::FORBIDDEN,
            RelayError::Auth { .. } => StatusCode::UNAUTHORIZED,
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::Provider { .. }
            | RelayError::RunTerminal { .. }
            | RelayError::Timeout { .. }
            | RelayError::Protocol { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Config(_) | RelayError::Storage { .. } | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match &self.0 {
            RelayError::Input(message) => message.clone(),
            RelayError::Auth { reason, .. } => reason.clone(),
            err @ RelayError::NotFound { .. } => err.to_string(),
            RelayError::Provider { .. }
            | RelayError::RunTerminal { .. }
            | RelayError::Timeout { .. }
            | RelayError::Protocol { .. } => "upstream assistant unavailable".to_string(),
            RelayError::Cancelled => "server is shutting down".to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            tracing::debug!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
