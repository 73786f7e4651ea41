// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # GraphQL Execution
//!
//! The execution engine is pluggable through [`GraphqlExecutor`]. This module
//! owns the hook points around it:
//!
//! ```text
//! classify ─▶ [mutation] check nonce ─▶ execute ─▶ [mutation, success] commit nonce
//! ```
//!
//! A mutation counts as successful when its response has data and no errors.
//! Anything else leaves the nonce unused.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::auth::{SecurityContext, SecurityError};
use crate::error::ApiError;
use crate::replay::{ReplayError, ReplayGuard};

pub mod operation;
pub mod upstream;

pub use operation::{classify, OperationError, OperationKind};
pub use upstream::ForwardingExecutor;

/// GraphQL-over-HTTP request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub variables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub extensions: Option<Value>,
}

/// GraphQL response body, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GraphqlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub errors: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub extensions: Option<Value>,
}

impl GraphqlResponse {
    /// Data present and no errors reported.
    pub fn is_success(&self) -> bool {
        let no_errors = self.errors.as_ref().is_none_or(|errors| errors.is_empty());
        let has_data = self.data.as_ref().is_some_and(|data| !data.is_null());
        no_errors && has_data
    }
}

/// Failure of the execution engine itself (not a GraphQL error).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {status} without a GraphQL body")]
    InvalidResponse { status: u16 },
}

/// Execution engine behind the security pipeline.
#[async_trait]
pub trait GraphqlExecutor: Send + Sync {
    /// Operation type of the request.
    fn classify(&self, request: &GraphqlRequest) -> Result<OperationKind, OperationError> {
        classify(&request.query, request.operation_name.as_deref())
    }

    /// Execute an authenticated request.
    async fn execute(
        &self,
        context: &SecurityContext,
        request: GraphqlRequest,
    ) -> Result<GraphqlResponse, ExecutorError>;
}

/// Run `request` through the replay hooks and the executor.
///
/// `replay` is `None` when replay protection is disabled for the deployment.
pub async fn execute_guarded(
    executor: &dyn GraphqlExecutor,
    replay: Option<&ReplayGuard>,
    context: &SecurityContext,
    request: GraphqlRequest,
) -> Result<GraphqlResponse, ApiError> {
    let kind = executor
        .classify(&request)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let guard = replay.filter(|_| kind.is_mutation());

    if let Some(guard) = guard {
        guard
            .check_not_used(&context.nonce_key)
            .await
            .map_err(SecurityError::from)?;
    }

    let operation_name = request
        .operation_name
        .clone()
        .unwrap_or_else(|| "anonymous".to_owned());
    let start = Instant::now();
    let result = executor.execute(context, request).await;
    debug!(
        operation = %operation_name,
        kind = ?kind,
        duration_ms = start.elapsed().as_millis() as u64,
        "GraphQL execution of '{operation_name}' completed"
    );

    let response = result.map_err(|e| {
        error!(operation = %operation_name, error = %e, "GraphQL execution failed");
        ApiError::bad_gateway("Upstream GraphQL service unavailable")
    })?;

    if let Some(guard) = guard {
        if response.is_success() {
            match guard.commit(&context.nonce_key, &context.timestamp).await {
                Ok(()) => {}
                Err(ReplayError::Replayed(_)) => return Err(SecurityError::ReplayAttack.into()),
                // Already logged; the mutation has run, so the caller still
                // gets its result.
                Err(ReplayError::Store(_)) => {}
            }
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::auth::{Identity, Role, VerificationPath};
    use crate::replay::{InMemoryNonceStore, NonceKey, NonceStore, NonceStoreError};

    /// Executor returning a canned response and counting calls.
    struct StubExecutor {
        response: GraphqlResponse,
        calls: AtomicUsize,
    }

    impl StubExecutor {
        fn ok() -> Self {
            Self::with(GraphqlResponse {
                data: Some(json!({ "addExpense": { "id": "1" } })),
                ..Default::default()
            })
        }

        fn failing() -> Self {
            Self::with(GraphqlResponse {
                data: None,
                errors: Some(vec![json!({ "message": "amount must be positive" })]),
                extensions: None,
            })
        }

        fn with(response: GraphqlResponse) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GraphqlExecutor for StubExecutor {
        async fn execute(
            &self,
            _context: &SecurityContext,
            _request: GraphqlRequest,
        ) -> Result<GraphqlResponse, ExecutorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    /// Store that counts every access.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryNonceStore,
        reads: AtomicUsize,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl NonceStore for CountingStore {
        async fn contains(&self, key: &str) -> Result<bool, NonceStoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.contains(key).await
        }

        async fn insert_if_absent(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, NonceStoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_if_absent(key, value, ttl).await
        }
    }

    /// Store whose check always passes and whose commit has a fixed outcome.
    struct CommitOutcomeStore {
        commit: fn() -> Result<bool, NonceStoreError>,
    }

    #[async_trait]
    impl NonceStore for CommitOutcomeStore {
        async fn contains(&self, _key: &str) -> Result<bool, NonceStoreError> {
            Ok(false)
        }

        async fn insert_if_absent(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<bool, NonceStoreError> {
            (self.commit)()
        }
    }

    fn context(nonce: &str) -> SecurityContext {
        SecurityContext {
            identity: Identity {
                id: "user_1".into(),
                role: Role::User,
                email: "ada@example.com".into(),
                name: "Ada".into(),
            },
            access_token: "tok".into(),
            nonce_key: NonceKey::new(nonce),
            timestamp: "1700000000000".into(),
            path: VerificationPath::Signed,
        }
    }

    fn request(query: &str) -> GraphqlRequest {
        GraphqlRequest {
            query: query.into(),
            operation_name: None,
            variables: None,
            extensions: None,
        }
    }

    const MUTATION: &str = "mutation { addExpense(amount: 1) { id } }";
    const QUERY: &str = "query { expenses { id } }";

    #[test]
    fn success_requires_data_without_errors() {
        assert!(GraphqlResponse {
            data: Some(json!({})),
            errors: Some(vec![]),
            extensions: None
        }
        .is_success());
        assert!(!GraphqlResponse::default().is_success());
        assert!(!GraphqlResponse {
            data: Some(Value::Null),
            ..Default::default()
        }
        .is_success());
        assert!(!GraphqlResponse {
            data: Some(json!({ "a": 1 })),
            errors: Some(vec![json!({ "message": "partial" })]),
            extensions: None,
        }
        .is_success());
    }

    #[test]
    fn request_uses_camel_case() {
        let parsed: GraphqlRequest = serde_json::from_value(json!({
            "query": "{ me { id } }",
            "operationName": "Me",
            "variables": { "a": 1 }
        }))
        .unwrap();
        assert_eq!(parsed.operation_name.as_deref(), Some("Me"));
        assert_eq!(parsed.variables, Some(json!({ "a": 1 })));
    }

    #[tokio::test]
    async fn replayed_mutation_is_rejected_before_execution() {
        let executor = StubExecutor::ok();
        let guard = ReplayGuard::new(Arc::new(InMemoryNonceStore::new(100)));
        let ctx = context("n-1");

        execute_guarded(&executor, Some(&guard), &ctx, request(MUTATION))
            .await
            .unwrap();
        let err = execute_guarded(&executor, Some(&guard), &ctx, request(MUTATION))
            .await
            .unwrap_err();

        assert_eq!(err.code, "REPLAY_ATTACK");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn failed_mutation_does_not_commit_nonce() {
        let guard = ReplayGuard::new(Arc::new(InMemoryNonceStore::new(100)));
        let ctx = context("n-2");

        let response = execute_guarded(&StubExecutor::failing(), Some(&guard), &ctx, request(MUTATION))
            .await
            .unwrap();
        assert!(!response.is_success());

        assert!(guard.check_not_used(&ctx.nonce_key).await.is_ok());
        execute_guarded(&StubExecutor::ok(), Some(&guard), &ctx, request(MUTATION))
            .await
            .unwrap();
        assert!(guard.check_not_used(&ctx.nonce_key).await.is_err());
    }

    #[tokio::test]
    async fn losing_the_commit_race_is_a_replay() {
        let guard = ReplayGuard::new(Arc::new(CommitOutcomeStore { commit: || Ok(false) }));
        let executor = StubExecutor::ok();

        let err = execute_guarded(&executor, Some(&guard), &context("n-race"), request(MUTATION))
            .await
            .unwrap_err();

        assert_eq!(err.code, "REPLAY_ATTACK");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn commit_store_error_still_returns_result() {
        let guard = ReplayGuard::new(Arc::new(CommitOutcomeStore {
            commit: || Err(NonceStoreError::Backend("connection reset".into())),
        }));
        let executor = StubExecutor::ok();

        let response =
            execute_guarded(&executor, Some(&guard), &context("n-commit"), request(MUTATION))
                .await
                .unwrap();

        assert_eq!(response, executor.response);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn queries_never_touch_the_store() {
        let store = Arc::new(CountingStore::default());
        let guard = ReplayGuard::new(store.clone());
        let executor = StubExecutor::ok();
        let ctx = context("n-3");

        for _ in 0..3 {
            execute_guarded(&executor, Some(&guard), &ctx, request(QUERY))
                .await
                .unwrap();
        }

        assert_eq!(executor.calls(), 3);
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mutation_checks_then_commits_once() {
        let store = Arc::new(CountingStore::default());
        let guard = ReplayGuard::new(store.clone());

        execute_guarded(&StubExecutor::ok(), Some(&guard), &context("n-4"), request(MUTATION))
            .await
            .unwrap();

        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_guard_allows_repeats() {
        let executor = StubExecutor::ok();
        let ctx = context("n-5");
        for _ in 0..2 {
            execute_guarded(&executor, None, &ctx, request(MUTATION))
                .await
                .unwrap();
        }
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn unclassifiable_document_is_bad_request() {
        let executor = StubExecutor::ok();
        let mut req = request("query A { a } mutation B { b }");
        req.operation_name = None;

        let err = execute_guarded(&executor, None, &context("n-6"), req)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn mutation_selected_by_name_is_guarded() {
        let guard = ReplayGuard::new(Arc::new(InMemoryNonceStore::new(100)));
        let ctx = context("n-7");
        let mut req = request("query A { a } mutation B { b }");
        req.operation_name = Some("B".into());

        execute_guarded(&StubExecutor::ok(), Some(&guard), &ctx, req)
            .await
            .unwrap();
        assert!(guard.check_not_used(&ctx.nonce_key).await.is_err());
    }
}
