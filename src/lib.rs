// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GraphQL Gateway Guard - signed request authentication for GraphQL APIs
//!
//! Sits in front of a GraphQL service and admits only requests that the
//! trusted gateway signed within the last five minutes. Mutations can
//! additionally be protected against replay with a shared nonce store.
//!
//! ## Modules
//!
//! - `api` - HTTP routes and handlers (Axum)
//! - `auth` - Gateway signature verification and caller identity
//! - `replay` - Nonce tracking for mutations (Upstash Redis or in-memory)
//! - `graphql` - Operation classification and upstream execution
//! - `cors` - Origin allow-list with wildcard support

pub mod api;
pub mod auth;
pub mod config;
pub mod cors;
pub mod error;
pub mod graphql;
pub mod replay;
pub mod state;
