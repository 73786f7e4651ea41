// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CORS policy built from `ALLOWED_ORIGINS`.
//!
//! Entries without `*` must match the `Origin` header exactly. Entries with
//! `*` match case-insensitively, each `*` spanning any run of characters, so
//! `https://*.preview.example.dev` admits every preview deployment.

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    request::Parts,
    HeaderName, HeaderValue, Method,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::OPTIONS,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Whether `origin` is admitted by any of `patterns`.
pub fn origin_allowed(patterns: &[String], origin: &str) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.contains('*') {
            wildcard_match(&pattern.to_ascii_lowercase(), &origin.to_ascii_lowercase())
        } else {
            pattern == origin
        }
    })
}

fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = match parts.as_slice() {
        [only] => return *only == text,
        [first, .., last] => (*first, *last),
        [] => return false,
    };

    if text.len() < first.len() + last.len() || !text.starts_with(first) || !text.ends_with(last)
    {
        return false;
    }

    let end = text.len() - last.len();
    let mut pos = first.len();
    for middle in &parts[1..parts.len() - 1] {
        match text[pos..end].find(middle) {
            Some(idx) => pos += idx + middle.len(),
            None => return false,
        }
    }
    true
}

/// Layer that echoes admitted origins with credentials and answers
/// preflight requests.
pub fn cors_layer(patterns: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| origin_allowed(&patterns, origin))
            },
        ))
        .allow_credentials(true)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("x-project-token"),
            AUTHORIZATION,
            HeaderName::from_static("apollographql-client-name"),
            HeaderName::from_static("apollographql-client-version"),
        ])
        .vary([ORIGIN])
}
