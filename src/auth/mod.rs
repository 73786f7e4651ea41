// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Verifies that GraphQL requests come from the trusted gateway.
//!
//! ## Auth Flow
//!
//! 1. The gateway authenticates the end user and signs
//!    `"{user_id}:{role}:{timestamp}:{nonce}"` (or `"public:{timestamp}:{nonce}"`)
//!    with the shared gateway secret (HMAC-SHA256, hex)
//! 2. It forwards the request with `X-Project-Token`, `X-Gateway-*`,
//!    `Authorization: Bearer <token>` and `X-User-*` headers
//! 3. This service:
//!    - checks the project token
//!    - checks the timestamp is within five minutes of now
//!    - recomputes and compares the signature in constant time
//!    - extracts the bearer token and caller identity
//!
//! ## Security
//!
//! - Every `/graphql` request is authenticated; health probes are not
//! - Signatures and tokens are compared in constant time
//! - Replay protection for mutations lives in [`crate::replay`]

pub mod error;
pub mod extractor;
pub mod headers;
pub mod identity;
pub mod middleware;
pub mod roles;
pub mod signer;
pub mod verifier;

pub use error::{ErrorCategory, SecurityError};
pub use extractor::Auth;
pub use headers::SecurityHeaders;
pub use identity::{Identity, SecurityContext};
pub use middleware::GatewayAuthenticator;
pub use roles::Role;
pub use signer::{constant_time_eq, sign, SignaturePayload, Signer};
pub use verifier::{SignatureVerifier, VerificationPath, VerifiedRequest};
