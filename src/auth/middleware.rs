// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway authentication middleware for Axum.
//!
//! Runs the full inbound pipeline once per request and stores the resulting
//! [`SecurityContext`] in the request extensions:
//!
//! 1. `X-Project-Token` must match the deployment token
//! 2. timestamp freshness and gateway signature ([`SignatureVerifier`])
//! 3. bearer token from `Authorization`
//! 4. caller identity from the `X-User-*` headers
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/graphql", post(graphql_handler))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         require_gateway_auth,
//!     ));
//! ```

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use super::headers::SecurityHeaders;
use super::identity::{extract_access_token, Identity, SecurityContext};
use super::signer::constant_time_eq;
use super::verifier::SignatureVerifier;
use super::SecurityError;
use crate::config::{ConfigError, SecurityConfig, GATEWAY_SECRET_ENV};
use crate::state::AppState;

/// Inbound request authenticator built from the process configuration.
#[derive(Debug, Clone)]
pub struct GatewayAuthenticator {
    project_token: String,
    verifier: SignatureVerifier,
}

impl GatewayAuthenticator {
    pub fn new(config: &SecurityConfig) -> Result<Self, ConfigError> {
        let verifier =
            SignatureVerifier::new(&config.gateway_secret, config.gateway_signature.clone())
                .map_err(|e| ConfigError::Invalid {
                    name: GATEWAY_SECRET_ENV,
                    reason: e.to_string(),
                })?;
        Ok(Self {
            project_token: config.project_token.clone(),
            verifier,
        })
    }

    /// Authenticate against the current wall clock.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<SecurityContext, SecurityError> {
        self.authenticate_at(headers, Utc::now().timestamp_millis())
    }

    /// Authenticate against `now_ms` (epoch milliseconds).
    pub fn authenticate_at(
        &self,
        headers: &HeaderMap,
        now_ms: i64,
    ) -> Result<SecurityContext, SecurityError> {
        let headers = SecurityHeaders::from_headers(headers);

        let token_ok = headers
            .project_token
            .as_deref()
            .is_some_and(|token| constant_time_eq(token, &self.project_token));
        if !token_ok {
            warn!("Unauthorized access attempt: invalid project token");
            return Err(SecurityError::InvalidProjectToken);
        }

        let verified = self.verifier.verify_at(&headers, now_ms)?;
        let access_token = extract_access_token(&headers)?;
        let identity = Identity::from_headers(&headers)?;

        Ok(SecurityContext {
            identity,
            access_token,
            nonce_key: verified.nonce_key,
            timestamp: verified.timestamp,
            path: verified.path,
        })
    }
}

/// Authentication middleware function.
pub async fn require_gateway_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.authenticator.authenticate(request.headers()) {
        Ok(context) => {
            debug!(
                user_id = %context.identity.id,
                role = %context.identity.role,
                path = ?context.path,
                "Gateway request authenticated"
            );
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
