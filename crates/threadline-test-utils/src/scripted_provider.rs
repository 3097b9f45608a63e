// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assistant provider that replays a scripted run.
//!
//! Each call to `retrieve_run` consumes one [`Step`]: the run status to report
//! and the thread's newest message as `latest_message` will see it until the
//! next poll. When the script runs out, the last step repeats, so a single
//! `queued` step models a run that never starts.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use threadline_core::{
    AdapterType, AssistantProvider, AssistantSpec, HealthStatus, PluginAdapter, RelayError,
    RemoteMessage, RemoteRun, Role, RunEventStream, RunFailure, RunStatus, RunStreamEvent,
    ThreadMessageRequest,
};

/// One observed poll: run status plus newest message snapshot.
#[derive(Debug, Clone)]
pub struct Step {
    pub status: RunStatus,
    pub message: Option<RemoteMessage>,
    pub last_error: Option<RunFailure>,
}

impl Step {
    /// Status with no assistant message yet.
    pub fn status(status: RunStatus) -> Self {
        Self {
            status,
            message: None,
            last_error: None,
        }
    }

    /// Status with the assistant message `msg_1` holding `text`.
    pub fn text(status: RunStatus, text: &str) -> Self {
        Self::message(status, "msg_1", text)
    }

    /// Status with an assistant message of the given id.
    pub fn message(status: RunStatus, message_id: &str, text: &str) -> Self {
        Self {
            status,
            message: Some(RemoteMessage {
                id: message_id.to_string(),
                role: Role::Assistant,
                run_id: None,
                text: text.to_string(),
            }),
            last_error: None,
        }
    }

    /// Terminal failure carrying provider error detail.
    pub fn failed(code: &str, message: &str) -> Self {
        Self {
            status: RunStatus::Failed,
            message: None,
            last_error: Some(RunFailure {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    current: Option<Step>,
    stream_events: Option<Vec<Result<RunStreamEvent, RelayError>>>,
    added_messages: Vec<(String, ThreadMessageRequest)>,
    assistant_specs: Vec<AssistantSpec>,
}

/// A provider replaying a fixed script with call counters.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
    fail_create_run: bool,
    hold_stream_open: bool,
    poll_delay: Option<Duration>,
    assistants_created: AtomicUsize,
    threads_created: AtomicUsize,
    runs_created: AtomicUsize,
    runs_cancelled: AtomicUsize,
    polls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(Script {
                steps: VecDeque::from(steps),
                ..Script::default()
            }),
            ..Self::default()
        }
    }

    /// Run that streams `chunks` over successive polls and completes on the last.
    pub fn replying(chunks: &[&str]) -> Self {
        let mut text = String::new();
        let mut steps = vec![Step::status(RunStatus::Queued)];
        for (i, chunk) in chunks.iter().enumerate() {
            text.push_str(chunk);
            let status = if i + 1 == chunks.len() {
                RunStatus::Completed
            } else {
                RunStatus::InProgress
            };
            steps.push(Step::text(status, &text));
        }
        Self::new(steps)
    }

    /// Events returned by `stream_run`. Without this, `stream_run` fails.
    pub fn with_stream(mut self, events: Vec<Result<RunStreamEvent, RelayError>>) -> Self {
        self.script.get_mut().stream_events = Some(events);
        self
    }

    /// Keep the scripted stream open after its last event instead of ending it.
    pub fn holding_stream_open(mut self) -> Self {
        self.hold_stream_open = true;
        self
    }

    /// Make `create_run` fail with a provider error.
    pub fn failing_create_run(mut self) -> Self {
        self.fail_create_run = true;
        self
    }

    /// Sleep before answering each `retrieve_run`.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    pub fn assistants_created(&self) -> usize {
        self.assistants_created.load(Ordering::SeqCst)
    }

    pub fn threads_created(&self) -> usize {
        self.threads_created.load(Ordering::SeqCst)
    }

    pub fn runs_created(&self) -> usize {
        self.runs_created.load(Ordering::SeqCst)
    }

    pub fn runs_cancelled(&self) -> usize {
        self.runs_cancelled.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Messages appended to threads, as `(thread_id, request)`.
    pub async fn added_messages(&self) -> Vec<(String, ThreadMessageRequest)> {
        self.script.lock().await.added_messages.clone()
    }

    /// Specs passed to `create_assistant`.
    pub async fn assistant_specs(&self) -> Vec<AssistantSpec> {
        self.script.lock().await.assistant_specs.clone()
    }

    fn run_id(&self) -> String {
        format!("run_{}", self.runs_created())
    }
}

#[async_trait]
impl PluginAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl AssistantProvider for ScriptedProvider {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String, RelayError> {
        self.script.lock().await.assistant_specs.push(spec.clone());
        let n = self.assistants_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("asst_{n}"))
    }

    async fn create_thread(
        &self,
        _metadata: &BTreeMap<String, String>,
    ) -> Result<String, RelayError> {
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("thread_{n}"))
    }

    async fn add_message(
        &self,
        thread_id: &str,
        message: &ThreadMessageRequest,
    ) -> Result<String, RelayError> {
        let mut script = self.script.lock().await;
        script
            .added_messages
            .push((thread_id.to_string(), message.clone()));
        Ok(format!("msg_user_{}", script.added_messages.len()))
    }

    async fn create_run(
        &self,
        thread_id: &str,
        _assistant_id: &str,
    ) -> Result<RemoteRun, RelayError> {
        if self.fail_create_run {
            return Err(RelayError::provider("API returned 500 Internal Server Error"));
        }
        self.runs_created.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteRun {
            id: self.run_id(),
            thread_id: thread_id.to_string(),
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<RemoteRun, RelayError> {
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        self.polls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().await;
        if let Some(next) = script.steps.pop_front() {
            script.current = Some(next);
        }
        let step = script
            .current
            .clone()
            .unwrap_or_else(|| Step::status(RunStatus::Queued));
        Ok(RemoteRun {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            status: step.status,
            last_error: step.last_error,
        })
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RemoteRun, RelayError> {
        self.runs_cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteRun {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            status: RunStatus::Cancelling,
            last_error: None,
        })
    }

    async fn latest_message(&self, _thread_id: &str) -> Result<Option<RemoteMessage>, RelayError> {
        let run_id = self.run_id();
        let script = self.script.lock().await;
        Ok(script
            .current
            .as_ref()
            .and_then(|step| step.message.clone())
            .map(|mut message| {
                message.run_id.get_or_insert(run_id);
                message
            }))
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunEventStream, RelayError> {
        let events = self.script.lock().await.stream_events.take();
        match events {
            Some(events) => {
                self.create_run(thread_id, assistant_id).await?;
                let events = stream::iter(events);
                if self.hold_stream_open {
                    Ok(Box::pin(events.chain(stream::pending())))
                } else {
                    Ok(Box::pin(events))
                }
            }
            None => Err(RelayError::provider("no stream scripted")),
        }
    }
}
