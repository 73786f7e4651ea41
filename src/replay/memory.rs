// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process nonce store.
//!
//! Bounded LRU map with a per-entry expiry. Set-if-absent runs under a single
//! mutex, so it is atomic within one process. Nonces are not shared between
//! instances; multi-instance deployments need [`super::UpstashNonceStore`].

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{NonceStore, NonceStoreError};

/// Default maximum number of remembered nonces.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Default interval between expiry sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct NonceEntry {
    /// Original request timestamp
    value: String,
    expires_at: Instant,
}

impl NonceEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process nonce store.
pub struct InMemoryNonceStore {
    entries: Mutex<LruCache<String, NonceEntry>>,
}

impl InMemoryNonceStore {
    /// Create a store remembering at most `capacity` nonces.
    ///
    /// When full, the least recently written nonce is dropped even if it has
    /// not expired yet; size the capacity for five minutes of mutations.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Drop all expired entries and return how many were removed.
    pub fn prune_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Value recorded for `key`, if the record has not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .peek(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Number of stored entries, expired ones included until pruned.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn contains(&self, key: &str) -> Result<bool, NonceStoreError> {
        let entries = self.entries.lock().map_err(|_| NonceStoreError::Poisoned)?;
        Ok(entries
            .peek(key)
            .is_some_and(|entry| entry.is_live(Instant::now())))
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, NonceStoreError> {
        let mut entries = self.entries.lock().map_err(|_| NonceStoreError::Poisoned)?;
        let now = Instant::now();

        if entries.peek(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }

        let evicted = entries.push(
            key.to_owned(),
            NonceEntry {
                value: value.to_owned(),
                expires_at: now + ttl,
            },
        );
        if let Some((evicted_key, entry)) = evicted {
            if evicted_key != key && entry.is_live(now) {
                warn!(
                    nonce_key = %evicted_key,
                    "Nonce store at capacity, evicted an unexpired nonce"
                );
            }
        }
        Ok(true)
    }
}

/// Background task that prunes expired nonces from an [`InMemoryNonceStore`].
pub struct NonceSweeper {
    store: Arc<InMemoryNonceStore>,
    interval: Duration,
}

impl NonceSweeper {
    pub fn new(store: Arc<InMemoryNonceStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Nonce sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Nonce sweeper shutting down");
                    return;
                }
            }

            let removed = self.store.prune_expired();
            if removed > 0 {
                debug!(removed, remaining = self.store.len(), "Pruned expired nonces");
            }
        }
    }
}
