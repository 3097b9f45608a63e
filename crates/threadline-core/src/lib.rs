// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Threadline AI response relay.
//!
//! This crate provides the trait definitions, error taxonomy and domain types
//! shared by the relay, the storage layer and provider adapters.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RelayError;
pub use types::{
    AdapterType, Agent, AssistantSpec, Attachment, Business, Capability, Conversation,
    ConversationMetadata, HealthStatus, Message, NewAgent, NewConversation, NewMessage,
    RemoteMessage, RemoteRun, Role, RunFailure, RunStatus, RunStreamEvent, StreamSession,
    ThreadMessageRequest,
};

pub use traits::{AssistantProvider, ChatStore, PluginAdapter, RunEventStream};
