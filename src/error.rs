// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GraphQL-shaped error responses.
//!
//! Every rejection leaves the service as
//! `{"errors":[{"message":..,"extensions":{"code":..,"status":..}}]}` so that
//! GraphQL clients and the gateway can branch on `extensions.code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Request age in milliseconds, only set for stale requests.
    pub time_difference: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody {
    errors: Vec<ErrorEntry>,
}

#[derive(Serialize)]
struct ErrorEntry {
    message: String,
    extensions: ErrorExtensions,
}

#[derive(Serialize)]
struct ErrorExtensions {
    code: &'static str,
    status: u16,
    #[serde(rename = "timeDifference", skip_serializing_if = "Option::is_none")]
    time_difference: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            time_difference: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Internal server error",
        )
    }

    pub fn with_time_difference(mut self, millis: u64) -> Self {
        self.time_difference = Some(millis);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            errors: vec![ErrorEntry {
                message: self.message,
                extensions: ErrorExtensions {
                    code: self.code,
                    status: self.status.as_u16(),
                    time_difference: self.time_difference,
                },
            }],
        });
        (self.status, body).into_response()
    }
}
