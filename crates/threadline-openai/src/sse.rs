// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE parser for streamed runs.
//!
//! Converts a reqwest response byte stream into provider-neutral
//! [`RunStreamEvent`]s using `eventsource-stream`. Frames whose payload cannot
//! be decoded become [`RelayError::Protocol`] items so the consumer can log
//! and skip them; transport failures become [`RelayError::Provider`].

use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use threadline_core::{RelayError, RunEventStream, RunStreamEvent};

use crate::types::{ApiErrorResponse, MessageDeltaEvent, MessageObject, RunObject};

/// Parses a streaming run response into a stream of [`RunStreamEvent`]s.
///
/// Step events, thread creation and other event names the relay does not
/// consume are skipped.
pub fn parse_run_stream(response: reqwest::Response) -> RunEventStream {
    let events = response.bytes_stream().eventsource();

    let mapped = events.filter_map(|result| async move {
        match result {
            Ok(event) => map_event(&event.event, &event.data),
            Err(e) => Some(Err(RelayError::Provider {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}

fn map_event(name: &str, data: &str) -> Option<Result<RunStreamEvent, RelayError>> {
    let parsed: Result<RunStreamEvent, Option<RelayError>> = match name {
        "done" => Ok(RunStreamEvent::Done),
        "error" => Err(Some(match serde_json::from_str::<ApiErrorResponse>(data) {
            Ok(body) => RelayError::provider(format!("run stream error: {}", body.error.message)),
            Err(_) => RelayError::provider(format!("run stream error: {data}")),
        })),
        "thread.message.delta" => decode::<MessageDeltaEvent>(name, data).and_then(|delta| {
            let text = delta.text();
            if text.is_empty() {
                return Err(None);
            }
            Ok(RunStreamEvent::MessageDelta {
                message_id: delta.id,
                text,
            })
        }),
        "thread.message.completed" => decode::<MessageObject>(name, data)
            .and_then(|message| message.into_remote().ok_or(None))
            .map(RunStreamEvent::MessageCompleted),
        name if name.starts_with("thread.run.") && !name.starts_with("thread.run.step.") => {
            decode::<RunObject>(name, data).map(|run| RunStreamEvent::Run(run.into()))
        }
        _ => return None,
    };

    match parsed {
        Ok(event) => Some(Ok(event)),
        Err(Some(err)) => Some(Err(err)),
        // Decoded fine but carries nothing the relay uses.
        Err(None) => None,
    }
}

fn decode<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, Option<RelayError>> {
    serde_json::from_str(data).map_err(|e| {
        Some(RelayError::Protocol {
            message: format!("malformed `{name}` event: {e}"),
        })
    })
}
