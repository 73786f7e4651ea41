// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::GatewayAuthenticator;
use crate::config::{ConfigError, SecurityConfig};
use crate::graphql::GraphqlExecutor;
use crate::replay::ReplayGuard;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<GatewayAuthenticator>,
    /// `None` when replay protection is disabled.
    pub replay: Option<ReplayGuard>,
    pub executor: Arc<dyn GraphqlExecutor>,
}

impl AppState {
    pub fn new(
        security: &SecurityConfig,
        replay: Option<ReplayGuard>,
        executor: Arc<dyn GraphqlExecutor>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            authenticator: Arc::new(GatewayAuthenticator::new(security)?),
            replay,
            executor,
        })
    }
}
