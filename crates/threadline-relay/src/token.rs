// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session token store: single-use, expiring handoff from the submit request
//! to the stream request.
//!
//! The token travels in a URL, so `take` consumes it and nothing logs more
//! than [`token_prefix`] of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;
use threadline_core::{RelayError, StreamSession};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const TOKEN_BYTES: usize = 32;
const LOG_PREFIX_CHARS: usize = 8;

/// Expiring key-value store with consume-once reads.
#[async_trait]
pub trait SessionTokenStore: Send + Sync {
    /// Store `session` under `token` for `ttl`.
    async fn put(&self, token: &str, session: StreamSession, ttl: Duration)
    -> Result<(), RelayError>;

    /// Remove and return the session for `token`.
    ///
    /// Fails with an unauthorized error when the token is unknown, already
    /// taken, or expired.
    async fn take(&self, token: &str) -> Result<StreamSession, RelayError>;

    /// Drop expired entries, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// Generate an unguessable token: 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The part of a token that is safe to log.
pub fn token_prefix(token: &str) -> &str {
    token
        .char_indices()
        .nth(LOG_PREFIX_CHARS)
        .map_or(token, |(idx, _)| &token[..idx])
}

struct Entry {
    session: StreamSession,
    expires_at: Instant,
}

/// In-process [`SessionTokenStore`] backed by a concurrent map.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, Entry>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionTokenStore for MemoryTokenStore {
    async fn put(
        &self,
        token: &str,
        session: StreamSession,
        ttl: Duration,
    ) -> Result<(), RelayError> {
        let entry = Entry {
            session,
            expires_at: Instant::now() + ttl,
        };
        if self.entries.insert(token.to_string(), entry).is_some() {
            warn!(token = token_prefix(token), "session token collision, replaced entry");
        }
        debug!(token = token_prefix(token), ttl_secs = ttl.as_secs(), "session token stored");
        Ok(())
    }

    async fn take(&self, token: &str) -> Result<StreamSession, RelayError> {
        // Removal is the consume step: two concurrent takes cannot both succeed.
        let Some((_, entry)) = self.entries.remove(token) else {
            warn!(token = token_prefix(token), "unknown or consumed session token");
            return Err(RelayError::unauthorized("invalid or expired stream token"));
        };

        if entry.expires_at <= Instant::now() {
            warn!(token = token_prefix(token), "expired session token");
            return Err(RelayError::unauthorized("invalid or expired stream token"));
        }

        Ok(entry.session)
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

/// Purge expired tokens every `every` until `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<dyn SessionTokenStore>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("token sweeper stopped");
                    return;
                }
                _ = interval.tick() => {
                    let purged = store.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "purged expired session tokens");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> StreamSession {
        StreamSession {
            user_id: "alice".into(),
            conversation_id: 1,
            user_message_id: 10,
            content: "Hello".into(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn prefix_is_eight_chars() {
        assert_eq!(token_prefix("0123456789abcdef"), "01234567");
        assert_eq!(token_prefix("abc"), "abc");
    }

    #[tokio::test]
    async fn take_is_single_use() {
        let store = MemoryTokenStore::new();
        store
            .put("tok", session(), Duration::from_secs(600))
            .await
            .unwrap();

        assert_eq!(store.take("tok").await.unwrap(), session());
        for _ in 0..3 {
            let err = store.take("tok").await.unwrap_err();
            assert!(matches!(err, RelayError::Auth { forbidden: false, .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn take_fails_after_ttl_without_consumption() {
        let store = MemoryTokenStore::new();
        store
            .put("tok", session(), Duration::from_secs(600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(store.take("tok").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn take_succeeds_just_before_ttl() {
        let store = MemoryTokenStore::new();
        store
            .put("tok", session(), Duration::from_secs(600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(store.take("tok").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let store = MemoryTokenStore::new();
        store
            .put("short", session(), Duration::from_secs(10))
            .await
            .unwrap();
        store
            .put("long", session(), Duration::from_secs(600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len(), 1);
        assert!(store.take("long").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_in_background() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .put("tok", session(), Duration::from_secs(5))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_secs(1), cancel.clone());

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(store.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
