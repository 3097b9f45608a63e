// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `GET /v1/stream/{token}`: relays one turn as server-sent events.
//!
//! ```text
//! event: chunk
//! data: {"content":"Hi"}
//!
//! event: done
//! data: [DONE]
//! ```

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use threadline_relay::RelayFrame;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Encode one relay frame as an SSE event.
pub fn to_event(frame: &RelayFrame) -> Event {
    Event::default().event(frame.event_name()).data(frame.data())
}

/// Token problems are answered with a plain 401 before the stream starts.
pub async fn get_stream(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let frames = state.service.open_stream(&token).await?;
    let events = frames.map(|frame| Ok::<_, Infallible>(to_event(&frame)));

    // Proxies must not hold frames back.
    let headers = [("x-accel-buffering", "no"), ("cache-control", "no-cache")];
    Ok((headers, Sse::new(events).keep_alive(KeepAlive::default())).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_encode_with_event_names() {
        // Event has no public accessors; its Debug output carries the encoded buffer.
        let event = to_event(&RelayFrame::Chunk {
            content: "Hi".into(),
        });
        let debug = format!("{event:?}");
        assert!(debug.contains("chunk"));
        assert!(debug.contains("Hi"));
    }
}
