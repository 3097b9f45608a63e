// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Threadline relay.
//!
//! Authenticated JSON routes submit and list messages; the stream route is
//! authenticated only by the single-use token in its path and answers with
//! server-sent events.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use auth::{AuthUser, BearerAuth};
pub use error::ApiError;
pub use server::{GatewayState, HealthState, router, start_server};
