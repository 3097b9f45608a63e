// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run driver: pushes one user message into a remote thread, starts a run and
//! drives it to a terminal state, yielding text increments on a channel.
//!
//! Two sources feed the same [`RunEvent`] channel. In poll mode the driver
//! alternates `retrieve_run` and `latest_message` and derives suffix deltas
//! with a [`DeltaTracker`]. In stream mode it consumes the provider's run
//! event stream and falls back to polling when that stream ends early.
//!
//! Nothing is persisted here.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use threadline_config::model::{DriverMode, RelayConfig};
use threadline_core::{
    AssistantProvider, Attachment, RelayError, RemoteMessage, RemoteRun, Role, RunEventStream,
    RunStatus, RunStreamEvent, ThreadMessageRequest,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 32;

/// Item yielded by a driven run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Newly generated assistant text, never empty.
    Delta(String),
    /// The run completed; always the last event.
    Completed(RunOutcome),
}

/// Final result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub text: String,
    pub thread_id: String,
    pub run_id: String,
}

/// Everything needed to drive one turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub conversation_id: i64,
    pub business_id: i64,
    pub thread_id: String,
    pub assistant_id: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub mode: DriverMode,
    pub max_poll_attempts: u32,
    pub poll_interval: Duration,
}

impl From<&RelayConfig> for DriverSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            mode: config.mode,
            max_poll_attempts: config.max_poll_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Computes suffix deltas between successive snapshots of assistant text.
///
/// Text for one message id is assumed to only grow. A new message id resets
/// the tracker and its full text becomes the delta.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    message_id: Option<String>,
    text: String,
}

impl DeltaTracker {
    /// Observe a full snapshot of `message_id`, returning the unseen suffix.
    pub fn observe(&mut self, message_id: &str, snapshot: &str) -> Option<String> {
        if self.message_id.as_deref() != Some(message_id) {
            self.message_id = Some(message_id.to_string());
            self.text = snapshot.to_string();
            return non_empty(snapshot);
        }

        let seen = self.text.len();
        if snapshot.len() <= seen {
            return None;
        }
        if !snapshot.is_char_boundary(seen) || !snapshot.starts_with(self.text.as_str()) {
            // Rewritten rather than extended: resync without emitting.
            warn!(message_id, "assistant text was rewritten, resyncing");
            self.text = snapshot.to_string();
            return None;
        }
        let delta = snapshot[seen..].to_string();
        self.text = snapshot.to_string();
        Some(delta)
    }

    /// Append a pushed fragment of `message_id`, returning it when non-empty.
    pub fn append(&mut self, message_id: &str, fragment: &str) -> Option<String> {
        if self.message_id.as_deref() != Some(message_id) {
            self.message_id = Some(message_id.to_string());
            self.text.clear();
        }
        self.text.push_str(fragment);
        non_empty(fragment)
    }

    /// Full text of the current message.
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

type EventSender = mpsc::Sender<Result<RunEvent, RelayError>>;

/// Drives remote runs. Cheap to clone.
#[derive(Clone)]
pub struct RunDriver {
    provider: Arc<dyn AssistantProvider>,
    settings: DriverSettings,
}

impl RunDriver {
    pub fn new(provider: Arc<dyn AssistantProvider>, settings: DriverSettings) -> Self {
        Self { provider, settings }
    }

    /// Drive `turn` on a background task.
    ///
    /// The receiver yields zero or more deltas followed by exactly one
    /// terminal item: `Ok(RunEvent::Completed)` or an error. Dropping the
    /// receiver or cancelling `cancel` stops the task at its next check.
    pub fn spawn(
        &self,
        turn: Turn,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Result<RunEvent, RelayError>> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let driver = self.clone();
        tokio::spawn(async move {
            let result = driver.drive(&turn, &tx, &cancel).await;
            let terminal = result.map(RunEvent::Completed);
            if tx.send(terminal).await.is_err() {
                debug!(conversation_id = turn.conversation_id, "run result dropped, receiver gone");
            }
        });
        rx
    }

    async fn drive(
        &self,
        turn: &Turn,
        tx: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RelayError> {
        let message = ThreadMessageRequest {
            content: turn.content.clone(),
            attachments: turn.attachments.clone(),
            metadata: [
                ("conversation_id".to_string(), turn.conversation_id.to_string()),
                ("business_id".to_string(), turn.business_id.to_string()),
            ]
            .into(),
        };
        self.provider.add_message(&turn.thread_id, &message).await?;

        let mut tracker = DeltaTracker::default();
        match self.settings.mode {
            DriverMode::Poll => {
                let run = self
                    .provider
                    .create_run(&turn.thread_id, &turn.assistant_id)
                    .await?;
                info!(thread_id = %turn.thread_id, run_id = %run.id, "run started");
                self.poll(&turn.thread_id, &run.id, &mut tracker, tx, cancel)
                    .await
            }
            DriverMode::Stream => self.stream(turn, &mut tracker, tx, cancel).await,
        }
    }

    async fn poll(
        &self,
        thread_id: &str,
        run_id: &str,
        tracker: &mut DeltaTracker,
        tx: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RelayError> {
        let result = self.poll_run(thread_id, run_id, tracker, tx, cancel).await;
        if matches!(result, Err(RelayError::Cancelled)) {
            self.cancel_remote(thread_id, run_id).await;
        }
        result
    }

    async fn poll_run(
        &self,
        thread_id: &str,
        run_id: &str,
        tracker: &mut DeltaTracker,
        tx: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RelayError> {
        let max = self.settings.max_poll_attempts;
        let mut warned_requires_action = false;

        for attempt in 1..=max {
            if cancel.is_cancelled() {
                return Err(RelayError::Cancelled);
            }
            if attempt > 1 {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                }
            }

            let run = self.provider.retrieve_run(thread_id, run_id).await?;
            debug!(thread_id, run_id, attempt, status = %run.status, "polled run");

            let delta = self
                .provider
                .latest_message(thread_id)
                .await?
                .filter(|message| belongs_to_run(message, run_id))
                .and_then(|message| tracker.observe(&message.id, &message.text));
            if let Some(delta) = delta {
                emit(tx, delta).await?;
            }

            match run.status {
                RunStatus::Completed => {
                    threadline_prometheus::record_poll_attempts(attempt);
                    return finish(tracker, thread_id, run_id);
                }
                RunStatus::RequiresAction if !warned_requires_action => {
                    // Tool calls are not implemented; the run is left to expire or resume.
                    warn!(thread_id, run_id, "run requires action, continuing to poll");
                    warned_requires_action = true;
                }
                status if status.is_terminal() => {
                    threadline_prometheus::record_poll_attempts(attempt);
                    return Err(terminal_error(&run));
                }
                _ => {}
            }
        }

        threadline_prometheus::record_poll_attempts(max);
        warn!(thread_id, run_id, attempts = max, "run did not complete within attempt bound");
        Err(RelayError::Timeout { attempts: max })
    }

    async fn stream(
        &self,
        turn: &Turn,
        tracker: &mut DeltaTracker,
        tx: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RelayError> {
        let thread_id = turn.thread_id.as_str();
        let mut events = match self
            .provider
            .stream_run(thread_id, &turn.assistant_id)
            .await
        {
            Ok(events) => events,
            Err(RelayError::Provider { message, .. }) => {
                warn!(thread_id, error = %message, "run stream unavailable, polling instead");
                let run = self
                    .provider
                    .create_run(thread_id, &turn.assistant_id)
                    .await?;
                return self.poll(thread_id, &run.id, tracker, tx, cancel).await;
            }
            Err(e) => return Err(e),
        };

        let mut run_id: Option<String> = None;
        let consumed = self
            .consume_stream(thread_id, &mut events, &mut run_id, tracker, tx, cancel)
            .await;
        match (consumed, run_id) {
            (Ok(Some(outcome)), _) => Ok(outcome),
            (Err(RelayError::Cancelled), Some(run_id)) => {
                self.cancel_remote(thread_id, &run_id).await;
                Err(RelayError::Cancelled)
            }
            (Err(e), _) => Err(e),
            (Ok(None), Some(run_id)) => {
                warn!(thread_id, %run_id, "run stream ended before a terminal event, polling");
                self.poll(thread_id, &run_id, tracker, tx, cancel).await
            }
            (Ok(None), None) => Err(RelayError::provider(
                "run stream ended before the run was created",
            )),
        }
    }

    /// Relay pushed events until the run completes (`Some`) or the stream
    /// ends without a terminal event (`None`). `run_id` tracks the run seen so far.
    async fn consume_stream(
        &self,
        thread_id: &str,
        events: &mut RunEventStream,
        run_id: &mut Option<String>,
        tracker: &mut DeltaTracker,
        tx: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<Option<RunOutcome>, RelayError> {
        let mut valid_events = 0usize;
        let mut protocol_errors = 0usize;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                next = events.next() => next,
            };
            let Some(item) = next else { break };

            let event = match item {
                Ok(event) => event,
                Err(RelayError::Protocol { message }) => {
                    protocol_errors += 1;
                    warn!(thread_id, error = %message, "skipping malformed run stream frame");
                    continue;
                }
                Err(e) => return Err(e),
            };
            valid_events += 1;

            match event {
                RunStreamEvent::Run(run) => {
                    if run_id.is_none() {
                        info!(thread_id, run_id = %run.id, "run started");
                    }
                    *run_id = Some(run.id.clone());
                    match run.status {
                        RunStatus::Completed => {
                            return finish(tracker, thread_id, &run.id).map(Some);
                        }
                        RunStatus::RequiresAction => {
                            warn!(thread_id, run_id = %run.id, "run requires action, continuing");
                        }
                        status if status.is_terminal() => return Err(terminal_error(&run)),
                        _ => {}
                    }
                }
                RunStreamEvent::MessageDelta { message_id, text } => {
                    if let Some(delta) = tracker.append(&message_id, &text) {
                        emit(tx, delta).await?;
                    }
                }
                RunStreamEvent::MessageCompleted(message) => {
                    if message.role != Role::Assistant {
                        continue;
                    }
                    if let Some(delta) = tracker.observe(&message.id, &message.text) {
                        emit(tx, delta).await?;
                    }
                }
                RunStreamEvent::Done => break,
            }
        }

        if valid_events == 0 {
            return Err(RelayError::provider(format!(
                "run stream produced no valid events ({protocol_errors} malformed)"
            )));
        }
        Ok(None)
    }

    /// Best-effort stop of a run whose turn was abandoned.
    async fn cancel_remote(&self, thread_id: &str, run_id: &str) {
        match self.provider.cancel_run(thread_id, run_id).await {
            Ok(run) => info!(thread_id, run_id, status = %run.status, "abandoned run cancelled"),
            Err(e) => warn!(thread_id, run_id, error = %e, "failed to cancel abandoned run"),
        }
    }
}

/// Only assistant messages of the current run count as its output.
fn belongs_to_run(message: &RemoteMessage, run_id: &str) -> bool {
    message.role == Role::Assistant && message.run_id.as_deref().is_none_or(|id| id == run_id)
}

async fn emit(tx: &EventSender, delta: String) -> Result<(), RelayError> {
    tx.send(Ok(RunEvent::Delta(delta)))
        .await
        .map_err(|_| RelayError::Cancelled)
}

fn finish(tracker: &DeltaTracker, thread_id: &str, run_id: &str) -> Result<RunOutcome, RelayError> {
    if tracker.text().is_empty() {
        return Err(RelayError::provider(
            "run completed without assistant text",
        ));
    }
    info!(thread_id, run_id, chars = tracker.text().chars().count(), "run completed");
    Ok(RunOutcome {
        text: tracker.text().to_string(),
        thread_id: thread_id.to_string(),
        run_id: run_id.to_string(),
    })
}

fn terminal_error(run: &RemoteRun) -> RelayError {
    let detail = run
        .last_error
        .as_ref()
        .map(|e| format!("{}: {}", e.code, e.message));
    warn!(
        thread_id = %run.thread_id,
        run_id = %run.id,
        status = %run.status,
        detail = detail.as_deref().unwrap_or(""),
        "run ended unsuccessfully"
    );
    RelayError::RunTerminal {
        status: run.status,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tracker_emits_suffixes() {
        let mut tracker = DeltaTracker::default();
        assert_eq!(tracker.observe("m1", "Hi").as_deref(), Some("Hi"));
        assert_eq!(tracker.observe("m1", "Hi").as_deref(), None);
        assert_eq!(tracker.observe("m1", "Hi there!").as_deref(), Some(" there!"));
        assert_eq!(tracker.text(), "Hi there!");
    }

    #[test]
    fn tracker_never_emits_empty() {
        let mut tracker = DeltaTracker::default();
        assert_eq!(tracker.observe("m1", ""), None);
        assert_eq!(tracker.append("m1", ""), None);
    }

    #[test]
    fn tracker_emits_full_text_on_new_message_id() {
        let mut tracker = DeltaTracker::default();
        tracker.observe("m1", "Draft");
        assert_eq!(
            tracker.observe("m2", "Final answer").as_deref(),
            Some("Final answer")
        );
        assert_eq!(tracker.text(), "Final answer");
    }

    #[test]
    fn tracker_resyncs_on_rewrite() {
        let mut tracker = DeltaTracker::default();
        tracker.observe("m1", "Hello");
        assert_eq!(tracker.observe("m1", "Jello world"), None);
        assert_eq!(tracker.observe("m1", "Jello world!").as_deref(), Some("!"));
    }

    #[test]
    fn tracker_handles_multibyte_text() {
        let mut tracker = DeltaTracker::default();
        tracker.observe("m1", "héllo");
        assert_eq!(tracker.observe("m1", "héllo wörld").as_deref(), Some(" wörld"));
    }

    #[test]
    fn append_mixes_with_observe() {
        let mut tracker = DeltaTracker::default();
        assert_eq!(tracker.append("m1", "Hi").as_deref(), Some("Hi"));
        assert_eq!(tracker.append("m1", " there").as_deref(), Some(" there"));
        assert_eq!(tracker.observe("m1", "Hi there!").as_deref(), Some("!"));
    }

    proptest! {
        #[test]
        fn deltas_concatenate_to_final_text(chunks in prop::collection::vec(".{0,6}", 1..12)) {
            let mut tracker = DeltaTracker::default();
            let mut snapshot = String::new();
            let mut emitted = String::new();
            for chunk in &chunks {
                snapshot.push_str(chunk);
                if let Some(delta) = tracker.observe("m1", &snapshot) {
                    prop_assert!(!delta.is_empty());
                    emitted.push_str(&delta);
                }
            }
            prop_assert_eq!(emitted, snapshot);
        }
    }
}
