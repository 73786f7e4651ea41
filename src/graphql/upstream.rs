// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Executor that forwards authenticated operations to an upstream GraphQL
//! service.
//!
//! The verified caller travels as headers: the bearer token plus
//! `X-User-Id`, `X-User-Role`, `X-User-Email` and `X-User-Name`. The
//! upstream must only be reachable through this service.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use serde_json::Value;

use super::{ExecutorError, GraphqlExecutor, GraphqlRequest, GraphqlResponse};
use crate::auth::headers::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_NAME_HEADER, USER_ROLE_HEADER};
use crate::auth::SecurityContext;

/// Default upstream request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ForwardingExecutor {
    endpoint: url::Url,
    client: reqwest::Client,
}

impl ForwardingExecutor {
    pub fn new(endpoint: url::Url) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    fn build_request(
        &self,
        context: &SecurityContext,
        request: &GraphqlRequest,
    ) -> reqwest::RequestBuilder {
        let identity = &context.identity;
        self.client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, format!("Bearer {}", context.access_token))
            .header(USER_ID_HEADER, &identity.id)
            .header(USER_ROLE_HEADER, identity.role.as_str())
            .header(USER_EMAIL_HEADER, &identity.email)
            .header(USER_NAME_HEADER, &identity.name)
            .json(request)
    }
}

#[async_trait]
impl GraphqlExecutor for ForwardingExecutor {
    async fn execute(
        &self,
        context: &SecurityContext,
        request: GraphqlRequest,
    ) -> Result<GraphqlResponse, ExecutorError> {
        let response = self.build_request(context, &request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        // GraphQL servers report validation and resolver failures in the
        // body, often with a 4xx/5xx status; pass those through as-is.
        parse_graphql_body(&body).ok_or(ExecutorError::InvalidResponse { status })
    }
}

/// Parse an upstream body that carries `data` or `errors` at the top level.
///
/// Proxy error pages and other JSON objects yield `None`.
fn parse_graphql_body(body: &[u8]) -> Option<GraphqlResponse> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    if !object.contains_key("data") && !object.contains_key("errors") {
        return None;
    }
    serde_json::from_value(value).ok()
}
