// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Security header extraction.
//!
//! Intermediaries do not preserve header casing. `HeaderMap` stores names
//! lowercased and matches lookups case-insensitively, so `X-Gateway-Nonce`,
//! `x-gateway-nonce` and `X-GATEWAY-NONCE` all resolve to the same entry.
//! Missing or non-text values become `None`; downstream stages decide whether
//! absence is fatal.

use axum::http::{header::AUTHORIZATION, HeaderMap};

pub const PROJECT_TOKEN_HEADER: &str = "x-project-token";
pub const TIMESTAMP_HEADER: &str = "x-gateway-timestamp";
pub const NONCE_HEADER: &str = "x-gateway-nonce";
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";
pub const FEDERATION_HEADER: &str = "x-schema-federation";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Snapshot of the security-relevant headers of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityHeaders {
    pub project_token: Option<String>,
    /// Epoch milliseconds, exactly as received
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    /// Hex HMAC
    pub signature: Option<String>,
    /// Raw `Authorization` value
    pub authorization: Option<String>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    /// `X-Schema-Federation: true`
    pub federation: bool,
}

impl SecurityHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            project_token: header(headers, PROJECT_TOKEN_HEADER),
            timestamp: header(headers, TIMESTAMP_HEADER),
            nonce: header(headers, NONCE_HEADER),
            signature: header(headers, SIGNATURE_HEADER),
            authorization: header(headers, AUTHORIZATION.as_str()),
            user_id: header(headers, USER_ID_HEADER),
            user_role: header(headers, USER_ROLE_HEADER),
            user_email: header(headers, USER_EMAIL_HEADER),
            user_name: header(headers, USER_NAME_HEADER),
            federation: header(headers, FEDERATION_HEADER).as_deref() == Some("true"),
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
