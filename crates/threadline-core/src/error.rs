// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Threadline relay.

use thiserror::Error;

use crate::types::RunStatus;

/// The primary error type used across all Threadline adapter traits and relay operations.
///
/// `Input`, `Auth` and `NotFound` are rejected synchronously before any remote
/// call is made. `Provider`, `RunTerminal`, `Timeout` and `Protocol` originate
/// from the remote AI provider and are never shown verbatim to end users.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid TOML, missing API key, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing or invalid message content.
    #[error("invalid input: {0}")]
    Input(String),

    /// No session, wrong owner, or an expired/consumed stream token.
    #[error("unauthorized: {reason}")]
    Auth { reason: String, forbidden: bool },

    /// A referenced local record does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Remote provider call failed (transport, non-2xx, malformed body).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote run ended in a non-successful terminal state.
    #[error("run ended with status {status}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    RunTerminal {
        status: RunStatus,
        detail: Option<String>,
    },

    /// The run did not complete within the poll attempt bound.
    #[error("run did not complete after {attempts} poll attempts")]
    Timeout { attempts: u32 },

    /// An event in the provider's own streaming format could not be parsed.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The turn was abandoned because the client went away.
    #[error("turn cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Authentication failure: missing, expired or already consumed credentials.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
            forbidden: false,
        }
    }

    /// Authorization failure: the caller is authenticated but does not own the resource.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
            forbidden: true,
        }
    }

    /// Provider failure without an underlying source error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Returns true for errors that are answered synchronously to the caller
    /// (4xx class) rather than converted into a fallback assistant message.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Input(_) | Self::Auth { .. } | Self::NotFound { .. }
        )
    }

    /// Short machine-readable label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Input(_) => "input",
            Self::Auth { .. } => "auth",
            Self::NotFound { .. } => "not_found",
            Self::Storage { .. } => "storage",
            Self::Provider { .. } => "provider",
            Self::RunTerminal { .. } => "run_terminal",
            Self::Timeout { .. } => "timeout",
            Self::Protocol { .. } => "protocol",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}
