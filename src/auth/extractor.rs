// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated gateway requests.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(ctx): Auth) -> impl IntoResponse {
//!     // ctx is SecurityContext
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use super::{SecurityContext, SecurityError};

/// Verified security context set by [`super::middleware::require_gateway_auth`].
///
/// Handlers reached without the middleware get an internal error rather
/// than an unauthenticated context.
pub struct Auth(pub SecurityContext);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = SecurityError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| {
                error!(path = %parts.uri.path(), "Security context missing; is the auth middleware installed?");
                SecurityError::Internal
            })
    }
}
