// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Coarse classification of a rejection.
///
/// Callers use it to decide whether a freshly signed retry can help
/// (`Stale`, `Dependency`) or whether the request itself is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MalformedRequest,
    Unauthenticated,
    Stale,
    Replay,
    Dependency,
    Internal,
}

/// Rejection raised while authenticating a gateway request.
///
/// Every variant is terminal for the request. Several variants share a
/// machine-readable code; the variant itself only matters for logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    /// `X-Project-Token` missing or wrong
    #[error("Unauthorized access")]
    InvalidProjectToken,
    /// No `Authorization` header
    #[error("Authentication failed")]
    MissingAccessToken,
    /// `Authorization` is not `Bearer <token>`
    #[error("Authentication failed")]
    InvalidAccessToken,
    /// One of the `X-User-*` identity headers is missing
    #[error("Unauthorized access")]
    IncompleteIdentity,
    /// Timestamp, nonce or signature header missing
    #[error("Missing required security headers")]
    MissingSecurityHeaders,
    /// Timestamp is not a base-10 integer
    #[error("Invalid request format")]
    InvalidTimestamp,
    /// Timestamp outside the freshness window
    #[error("Request expired: timestamp too old ({age_ms}ms difference)")]
    RequestExpired { age_ms: u64 },
    /// HMAC does not match
    #[error("Invalid signature from gateway")]
    InvalidSignature,
    /// Nonce already consumed by a mutation
    #[error("Duplicate request - nonce already used")]
    ReplayAttack,
    /// Replay store unreachable or failing
    #[error("Error validating request security")]
    NonceFetchError,
    /// Unexpected failure inside the security pipeline
    #[error("Internal server error")]
    Internal,
}

impl SecurityError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SecurityError::InvalidProjectToken
            | SecurityError::MissingAccessToken
            | SecurityError::InvalidAccessToken
            | SecurityError::IncompleteIdentity => "UNAUTHORIZED",
            SecurityError::MissingSecurityHeaders => "GATEWAY_UNAUTHORIZED",
            SecurityError::InvalidTimestamp => "INVALID_REQUEST",
            SecurityError::RequestExpired { .. } => "REQUEST_TIMEOUT",
            SecurityError::InvalidSignature => "INVALID_SIGNATURE",
            SecurityError::ReplayAttack => "REPLAY_ATTACK",
            SecurityError::NonceFetchError => "NONCE_FETCH_ERROR",
            SecurityError::Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SecurityError::InvalidProjectToken
            | SecurityError::MissingAccessToken
            | SecurityError::InvalidAccessToken
            | SecurityError::IncompleteIdentity
            | SecurityError::MissingSecurityHeaders
            | SecurityError::InvalidSignature
            | SecurityError::ReplayAttack => StatusCode::UNAUTHORIZED,
            SecurityError::InvalidTimestamp => StatusCode::BAD_REQUEST,
            SecurityError::RequestExpired { .. } => StatusCode::REQUEST_TIMEOUT,
            SecurityError::NonceFetchError | SecurityError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SecurityError::MissingSecurityHeaders | SecurityError::InvalidTimestamp => {
                ErrorCategory::MalformedRequest
            }
            SecurityError::InvalidProjectToken
            | SecurityError::MissingAccessToken
            | SecurityError::InvalidAccessToken
            | SecurityError::IncompleteIdentity
            | SecurityError::InvalidSignature => ErrorCategory::Unauthenticated,
            SecurityError::RequestExpired { .. } => ErrorCategory::Stale,
            SecurityError::ReplayAttack => ErrorCategory::Replay,
            SecurityError::NonceFetchError => ErrorCategory::Dependency,
            SecurityError::Internal => ErrorCategory::Internal,
        }
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        let api = ApiError::new(err.status_code(), err.error_code(), err.to_string());
        match err {
            SecurityError::RequestExpired { age_ms } => api.with_time_difference(age_ms),
            _ => api,
        }
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn codes_and_statuses_follow_the_gateway_contract() {
        let cases = [
            (SecurityError::InvalidProjectToken, "UNAUTHORIZED", 401),
            (SecurityError::MissingAccessToken, "UNAUTHORIZED", 401),
            (SecurityError::InvalidAccessToken, "UNAUTHORIZED", 401),
            (SecurityError::IncompleteIdentity, "UNAUTHORIZED", 401),
            (SecurityError::MissingSecurityHeaders, "GATEWAY_UNAUTHORIZED", 401),
            (SecurityError::InvalidTimestamp, "INVALID_REQUEST", 400),
            (SecurityError::RequestExpired { age_ms: 1 }, "REQUEST_TIMEOUT", 408),
            (SecurityError::InvalidSignature, "INVALID_SIGNATURE", 401),
            (SecurityError::ReplayAttack, "REPLAY_ATTACK", 401),
            (SecurityError::NonceFetchError, "NONCE_FETCH_ERROR", 500),
            (SecurityError::Internal, "INTERNAL_SERVER_ERROR", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.error_code(), code, "{err:?}");
            assert_eq!(err.status_code().as_u16(), status, "{err:?}");
        }
    }

    #[test]
    fn categories_separate_clock_signature_and_replay_problems() {
        assert_eq!(
            SecurityError::RequestExpired { age_ms: 5 }.category(),
            ErrorCategory::Stale
        );
        assert_eq!(
            SecurityError::InvalidSignature.category(),
            ErrorCategory::Unauthenticated
        );
        assert_eq!(SecurityError::ReplayAttack.category(), ErrorCategory::Replay);
        assert_eq!(
            SecurityError::NonceFetchError.category(),
            ErrorCategory::Dependency
        );
        assert_eq!(
            SecurityError::InvalidTimestamp.category(),
            ErrorCategory::MalformedRequest
        );
    }

    #[tokio::test]
    async fn expired_request_reports_age() {
        let response = SecurityError::RequestExpired { age_ms: 300_001 }.into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        let error = &body["errors"][0];
        assert_eq!(error["extensions"]["code"], "REQUEST_TIMEOUT");
        assert_eq!(error["extensions"]["timeDifference"], 300_001);
        assert_eq!(
            error["message"],
            "Request expired: timestamp too old (300001ms difference)"
        );
    }

    #[tokio::test]
    async fn replay_returns_401() {
        let response = SecurityError::ReplayAttack.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["errors"][0]["extensions"]["code"], "REPLAY_ATTACK");
    }
}
