// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Replay Protection
//!
//! Nonces of successful mutations are remembered for [`NONCE_TTL`] so that a
//! captured request cannot be executed twice inside its freshness window.
//!
//! ## Two-phase protocol
//!
//! 1. [`ReplayGuard::check_not_used`] before execution: a known nonce fails
//!    the request before any side effect happens.
//! 2. [`ReplayGuard::commit`] after a successful execution only: a failed
//!    mutation leaves its nonce unused, so the gateway may retry it.
//!
//! Queries never reach the guard.
//!
//! ## Store atomicity
//!
//! Two concurrent replays can both pass the check before either commits.
//! The commit therefore uses the store's atomic set-if-absent, and the
//! losing request is reported as a replay. Its side effect has already
//! happened at that point; only stores with atomic conditional writes
//! (both bundled adapters) detect it at all.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::auth::SecurityError;

pub mod memory;
pub mod upstash;

pub use memory::{InMemoryNonceStore, NonceSweeper};
pub use upstash::UpstashNonceStore;

/// How long a consumed nonce stays blocked (5 minutes).
pub const NONCE_TTL: Duration = Duration::from_secs(5 * 60);

const NONCE_KEY_PREFIX: &str = "nonce:";

/// Store key for a nonce: `"nonce:" + nonce`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonceKey(String);

impl NonceKey {
    pub fn new(nonce: &str) -> Self {
        Self(format!("{NONCE_KEY_PREFIX}{nonce}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure talking to the nonce store.
#[derive(Debug, thiserror::Error)]
pub enum NonceStoreError {
    #[error("nonce store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("nonce store returned HTTP {0}")]
    Status(u16),
    #[error("nonce store error: {0}")]
    Backend(String),
    #[error("unexpected nonce store response: {0}")]
    UnexpectedResponse(String),
    #[error("nonce store lock poisoned")]
    Poisoned,
}

/// Minimal capability the replay guard needs from a key-value store.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Whether an unexpired record exists for `key`.
    async fn contains(&self, key: &str) -> Result<bool, NonceStoreError>;

    /// Atomically write `key = value` with expiry `ttl` unless an unexpired
    /// record already exists. Returns `false` when the key was taken.
    async fn insert_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, NonceStoreError>;

    /// Liveness check used by the readiness probe.
    async fn ping(&self) -> Result<(), NonceStoreError> {
        Ok(())
    }
}

/// Replay guard failure.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("nonce {0} already used")]
    Replayed(NonceKey),
    #[error(transparent)]
    Store(#[from] NonceStoreError),
}

impl From<ReplayError> for SecurityError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Replayed(_) => SecurityError::ReplayAttack,
            ReplayError::Store(_) => SecurityError::NonceFetchError,
        }
    }
}

/// Check-then-commit nonce tracker.
#[derive(Clone)]
pub struct ReplayGuard {
    store: Arc<dyn NonceStore>,
    ttl: Duration,
}

impl ReplayGuard {
    pub fn new(store: Arc<dyn NonceStore>) -> Self {
        Self {
            store,
            ttl: NONCE_TTL,
        }
    }

    /// Override the record TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<dyn NonceStore> {
        &self.store
    }

    /// Fail if the nonce was already committed. Fails closed when the store
    /// cannot answer.
    pub async fn check_not_used(&self, key: &NonceKey) -> Result<(), ReplayError> {
        match self.store.contains(key.as_str()).await {
            Ok(false) => Ok(()),
            Ok(true) => {
                warn!(nonce_key = %key, "Potential replay attack detected: duplicate nonce");
                Err(ReplayError::Replayed(key.clone()))
            }
            Err(e) => {
                error!(nonce_key = %key, error = %e, "Failed to check nonce");
                Err(ReplayError::Store(e))
            }
        }
    }

    /// Record the nonce with the guard's TTL. `timestamp` is the original
    /// timestamp header and becomes the record value.
    pub async fn commit(&self, key: &NonceKey, timestamp: &str) -> Result<(), ReplayError> {
        match self
            .store
            .insert_if_absent(key.as_str(), timestamp, self.ttl)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(nonce_key = %key, "Concurrent replay detected while committing nonce");
                Err(ReplayError::Replayed(key.clone()))
            }
            Err(e) => {
                error!(nonce_key = %key, error = %e, "Failed to store nonce");
                Err(ReplayError::Store(e))
            }
        }
    }
}

impl std::fmt::Debug for ReplayGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayGuard")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
