// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Threadline relay.
//!
//! A turn flows through these pieces in order:
//!
//! - [`service::ChatService::submit_for_streaming`] records the user message
//!   and issues a single-use token ([`token`]).
//! - [`service::ChatService::open_stream`] consumes the token and spawns the
//!   [`relay::StreamRelay`], which binds the remote assistant and thread
//!   ([`binder`]), drives the run ([`driver`]) and persists the reply
//!   ([`store`]).

pub mod binder;
pub mod driver;
pub mod relay;
pub mod service;
pub mod store;
pub mod token;

pub use binder::ConversationBinder;
pub use driver::{DeltaTracker, DriverSettings, RunDriver, RunEvent, RunOutcome, Turn};
pub use relay::{DONE_SENTINEL, FrameStream, Frames, RelayFrame, StreamRelay};
pub use service::{ChatService, SubmitReceipt, SyncReply};
pub use store::MessageStore;
pub use token::{MemoryTokenStore, SessionTokenStore, generate_token, spawn_sweeper, token_prefix};
