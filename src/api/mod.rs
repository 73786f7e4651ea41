// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::require_gateway_auth, Identity, Role},
    cors::cors_layer,
    error::ApiError,
    graphql::{GraphqlRequest, GraphqlResponse},
    state::AppState,
};

pub mod graphql;
pub mod health;

pub fn router(state: AppState, allowed_origins: Vec<String>) -> Router {
    let graphql_routes = Router::new()
        .route(
            "/graphql",
            post(graphql::graphql_post).get(graphql::graphql_get),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_gateway_auth,
        ));

    Router::new()
        .merge(graphql_routes)
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(cors_layer(allowed_origins))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Not Found")
}

#[derive(OpenApi)]
#[openapi(
    paths(
        graphql::graphql_post,
        graphql::graphql_get,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            GraphqlRequest,
            GraphqlResponse,
            Identity,
            Role,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "GraphQL", description = "Gateway-authenticated GraphQL execution"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
