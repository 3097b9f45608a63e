// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for thread/run style conversational AI APIs.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AssistantSpec, RemoteMessage, RemoteRun, RunStreamEvent, ThreadMessageRequest,
};

/// Stream of push-based run events.
pub type RunEventStream = Pin<Box<dyn Stream<Item = Result<RunStreamEvent, RelayError>> + Send>>;

/// Adapter for a remote provider organised around assistants, threads and runs.
///
/// Runs complete in the background on the provider side. Callers either poll
/// [`retrieve_run`](AssistantProvider::retrieve_run) and
/// [`latest_message`](AssistantProvider::latest_message), or consume
/// [`stream_run`](AssistantProvider::stream_run) when the provider supports it.
#[async_trait]
pub trait AssistantProvider: PluginAdapter {
    /// Creates a remote assistant and returns its id.
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String, RelayError>;

    /// Creates an empty remote thread and returns its id.
    async fn create_thread(
        &self,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, RelayError>;

    /// Appends a user message to a thread and returns the remote message id.
    async fn add_message(
        &self,
        thread_id: &str,
        message: &ThreadMessageRequest,
    ) -> Result<String, RelayError>;

    /// Starts a run of `assistant_id` against `thread_id`.
    async fn create_run(&self, thread_id: &str, assistant_id: &str)
    -> Result<RemoteRun, RelayError>;

    /// Fetches the current state of a run.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<RemoteRun, RelayError>;

    /// Asks the provider to stop a run that is still queued or in progress.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RemoteRun, RelayError>;

    /// Fetches the newest message in a thread, if any.
    async fn latest_message(&self, thread_id: &str) -> Result<Option<RemoteMessage>, RelayError>;

    /// Starts a run and returns the provider's push-based event stream.
    ///
    /// Providers without streaming support keep the default, which fails with
    /// a provider error so callers fall back to polling.
    async fn stream_run(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
    ) -> Result<RunEventStream, RelayError> {
        Err(RelayError::provider(format!(
            "provider `{}` does not support run streaming",
            self.name()
        )))
    }
}
