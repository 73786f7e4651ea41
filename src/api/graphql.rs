// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::IntoParams;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::graphql::{execute_guarded, GraphqlExecutor, GraphqlRequest, GraphqlResponse};
use crate::state::AppState;

/// GraphQL over GET query string.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GraphqlQueryParams {
    /// GraphQL document
    pub query: String,
    /// Operation to run when the document holds several
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,
    /// JSON-encoded variables object
    pub variables: Option<String>,
    /// JSON-encoded extensions object
    pub extensions: Option<String>,
}

impl GraphqlQueryParams {
    fn into_request(self) -> Result<GraphqlRequest, ApiError> {
        Ok(GraphqlRequest {
            query: self.query,
            operation_name: self.operation_name,
            variables: parse_json_param("variables", self.variables)?,
            extensions: parse_json_param("extensions", self.extensions)?,
        })
    }
}

fn parse_json_param(
    name: &str,
    raw: Option<String>,
) -> Result<Option<serde_json::Value>, ApiError> {
    match raw.filter(|s| !s.is_empty()) {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("{name} must be valid JSON"))),
        None => Ok(None),
    }
}

/// Execute a GraphQL operation.
///
/// Mutations are subject to replay protection when it is enabled.
#[utoipa::path(
    post,
    path = "/graphql",
    tag = "GraphQL",
    request_body = GraphqlRequest,
    responses(
        (status = 200, description = "Execution result", body = GraphqlResponse),
        (status = 400, description = "Malformed request or unknown operation"),
        (status = 401, description = "Gateway authentication failed or nonce replayed"),
        (status = 408, description = "Request timestamp outside the freshness window"),
        (status = 500, description = "Nonce store unavailable"),
        (status = 502, description = "Upstream GraphQL service unavailable")
    )
)]
pub async fn graphql_post(
    State(state): State<AppState>,
    Auth(context): Auth,
    body: Result<Json<GraphqlRequest>, JsonRejection>,
) -> Result<Json<GraphqlResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let response = execute_guarded(
        state.executor.as_ref(),
        state.replay.as_ref(),
        &context,
        request,
    )
    .await?;
    Ok(Json(response))
}

/// Execute a read-only GraphQL operation from the query string.
#[utoipa::path(
    get,
    path = "/graphql",
    tag = "GraphQL",
    params(GraphqlQueryParams),
    responses(
        (status = 200, description = "Execution result", body = GraphqlResponse),
        (status = 400, description = "Malformed request or unknown operation"),
        (status = 401, description = "Gateway authentication failed"),
        (status = 405, description = "Mutations must use POST"),
        (status = 408, description = "Request timestamp outside the freshness window"),
        (status = 502, description = "Upstream GraphQL service unavailable")
    )
)]
pub async fn graphql_get(
    State(state): State<AppState>,
    Auth(context): Auth,
    params: Result<Query<GraphqlQueryParams>, QueryRejection>,
) -> Result<Json<GraphqlResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let request = params.into_request()?;

    let kind = state
        .executor
        .classify(&request)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    if kind.is_mutation() {
        debug!(user_id = %context.identity.id, "Rejected mutation over GET");
        return Err(ApiError::method_not_allowed(
            "Mutations can only be sent over POST",
        ));
    }

    let response = execute_guarded(
        state.executor.as_ref(),
        state.replay.as_ref(),
        &context,
        request,
    )
    .await?;
    Ok(Json(response))
}
