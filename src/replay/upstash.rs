// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upstash Redis nonce store over the REST API.
//!
//! Commands are POSTed to the database URL as a JSON array
//! (`["SET","nonce:abc","1700000000000","NX","EX","300"]`) with the REST
//! token as bearer credentials. Replies are `{"result": ...}` or
//! `{"error": "..."}`.
//!
//! `SET .. NX EX` is atomic on the Redis side, which makes the commit
//! race-free across service instances.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{NonceStore, NonceStoreError};

/// Per-command timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct UpstashReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Nonce store backed by Upstash Redis.
#[derive(Clone)]
pub struct UpstashNonceStore {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl UpstashNonceStore {
    /// # Arguments
    /// - `url`: REST endpoint (`UPSTASH_REDIS_REST_URL`)
    /// - `token`: REST token (`UPSTASH_REDIS_REST_TOKEN`)
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self, NonceStoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            token: token.into(),
            client,
        })
    }

    async fn command(&self, args: &[&str]) -> Result<Option<Value>, NonceStoreError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await?;

        let status = response.status();
        let reply: UpstashReply = match response.json().await {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => return Err(NonceStoreError::Status(status.as_u16())),
            Err(e) => return Err(NonceStoreError::Transport(e)),
        };
        reply_result(reply)
    }
}

impl std::fmt::Debug for UpstashNonceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashNonceStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

fn reply_result(reply: UpstashReply) -> Result<Option<Value>, NonceStoreError> {
    if let Some(error) = reply.error {
        return Err(NonceStoreError::Backend(error));
    }
    Ok(reply.result.filter(|value| !value.is_null()))
}

/// `SET .. NX` replies `"OK"` when written and `null` when the key exists.
fn set_outcome(result: Option<Value>) -> Result<bool, NonceStoreError> {
    match result {
        None => Ok(false),
        Some(Value::String(s)) if s == "OK" => Ok(true),
        Some(other) => Err(NonceStoreError::UnexpectedResponse(other.to_string())),
    }
}

/// `EX` takes whole seconds; sub-second TTLs round up so a record never
/// expires before its requested lifetime.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}

#[async_trait]
impl NonceStore for UpstashNonceStore {
    async fn contains(&self, key: &str) -> Result<bool, NonceStoreError> {
        Ok(self.command(&["GET", key]).await?.is_some())
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, NonceStoreError> {
        let ttl = ttl_seconds(ttl).to_string();
        let result = self
            .command(&["SET", key, value, "NX", "EX", &ttl])
            .await?;
        set_outcome(result)
    }

    async fn ping(&self) -> Result<(), NonceStoreError> {
        match self.command(&["PING"]).await? {
            Some(Value::String(s)) if s == "PONG" => Ok(()),
            other => Err(NonceStoreError::UnexpectedResponse(format!("{other:?}"))),
        }
    }
}
