// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.

use std::time::Duration;

use metrics::{describe_counter, describe_histogram};

/// How a relayed turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl TurnOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Register all Threadline metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("threadline_turns_total", "Relayed turns by outcome");
    describe_counter!("threadline_chunks_total", "Chunk frames emitted to clients");
    describe_counter!(
        "threadline_stream_tokens_issued_total",
        "Stream session tokens issued"
    );
    describe_histogram!(
        "threadline_poll_attempts",
        "Run status polls needed per turn"
    );
    describe_histogram!(
        "threadline_turn_latency_seconds",
        "Time from stream open to terminal frame"
    );
}

/// Record a finished turn and its latency.
pub fn record_turn(outcome: TurnOutcome, elapsed: Duration) {
    metrics::counter!("threadline_turns_total", "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!("threadline_turn_latency_seconds").record(elapsed.as_secs_f64());
}

/// Record one emitted chunk frame.
pub fn record_chunk() {
    metrics::counter!("threadline_chunks_total").increment(1);
}

/// Record how many polls a run took.
pub fn record_poll_attempts(attempts: u32) {
    metrics::histogram!("threadline_poll_attempts").record(f64::from(attempts));
}

/// Record an issued stream session token.
pub fn record_token_issued() {
    metrics::counter!("threadline_stream_tokens_issued_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(TurnOutcome::Completed.as_str(), "completed");
        assert_eq!(TurnOutcome::Failed.as_str(), "failed");
        assert_eq!(TurnOutcome::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_turn(TurnOutcome::Completed, Duration::from_millis(120));
        record_chunk();
        record_poll_attempts(3);
        record_token_issued();
    }
}
