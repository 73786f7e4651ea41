// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller identity asserted by the gateway.

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use super::headers::SecurityHeaders;
use super::roles::Role;
use super::verifier::VerificationPath;
use super::SecurityError;
use crate::replay::NonceKey;

/// Authenticated caller, built from the `X-User-*` headers.
///
/// Only trustworthy once the request signature has been verified: the
/// gateway signs the id and role into the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: String,
    pub role: Role,
    pub email: String,
    pub name: String,
}

impl Identity {
    /// Build the identity, rejecting if any field is missing.
    ///
    /// An empty role header still counts as present and maps to
    /// [`Role::User`] like any other unrecognized value.
    pub fn from_headers(headers: &SecurityHeaders) -> Result<Self, SecurityError> {
        let (Some(id), Some(role), Some(email), Some(name)) = (
            present(&headers.user_id),
            headers.user_role.as_deref(),
            present(&headers.user_email),
            present(&headers.user_name),
        ) else {
            warn!("Rejected request: incomplete caller identity headers");
            return Err(SecurityError::IncompleteIdentity);
        };

        Ok(Self {
            id: id.to_owned(),
            role: Role::from_header(role),
            email: email.to_owned(),
            name: name.to_owned(),
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Extract the raw bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively and surrounding whitespace is
/// trimmed from the token.
pub fn extract_access_token(headers: &SecurityHeaders) -> Result<String, SecurityError> {
    let value = present(&headers.authorization).ok_or_else(|| {
        warn!("Rejected request: missing authorization header");
        SecurityError::MissingAccessToken
    })?;

    let token = strip_bearer(value)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            warn!("Rejected request: malformed bearer token");
            SecurityError::InvalidAccessToken
        })?;

    Ok(token.to_owned())
}

fn strip_bearer(value: &str) -> Option<&str> {
    const PREFIX: &str = "bearer ";
    let head = value.get(..PREFIX.len())?;
    head.eq_ignore_ascii_case(PREFIX)
        .then(|| &value[PREFIX.len()..])
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Everything the security pipeline learned about a request.
///
/// Inserted into the request extensions by the middleware and owned by the
/// request for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub identity: Identity,
    pub access_token: String,
    pub nonce_key: NonceKey,
    /// Timestamp header as received, stored as the nonce record value
    pub timestamp: String,
    pub path: VerificationPath,
}
