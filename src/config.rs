// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup and is
//! immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PROJECT_TOKEN` | Pre-shared per-deployment token | Required |
//! | `GATEWAY_SECRET` | HMAC key shared with the gateway | Required |
//! | `GATEWAY_SIGNATURE` | Static signature for schema federation requests | Required |
//! | `ENVIRONMENT` | `DEV` disables replay protection | `PROD` |
//! | `NONCE_ENABLED` | `true` enables replay protection | `false` |
//! | `UPSTASH_REDIS_REST_URL` | Upstash Redis REST endpoint for nonces | In-memory store |
//! | `UPSTASH_REDIS_REST_TOKEN` | Upstash Redis REST token | In-memory store |
//! | `UPSTREAM_GRAPHQL_URL` | GraphQL service requests are forwarded to | Required |
//! | `ALLOWED_ORIGINS` | Comma-separated CORS origins, `*` wildcards allowed | Empty |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;

pub const PROJECT_TOKEN_ENV: &str = "PROJECT_TOKEN";
pub const GATEWAY_SECRET_ENV: &str = "GATEWAY_SECRET";
pub const GATEWAY_SIGNATURE_ENV: &str = "GATEWAY_SIGNATURE";
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";
pub const NONCE_ENABLED_ENV: &str = "NONCE_ENABLED";
pub const UPSTASH_URL_ENV: &str = "UPSTASH_REDIS_REST_URL";
pub const UPSTASH_TOKEN_ENV: &str = "UPSTASH_REDIS_REST_TOKEN";
pub const UPSTREAM_URL_ENV: &str = "UPSTREAM_GRAPHQL_URL";
pub const ALLOWED_ORIGINS_ENV: &str = "ALLOWED_ORIGINS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Default `RUST_LOG` filter when the variable is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Secrets used to authenticate inbound requests.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub project_token: String,
    pub gateway_secret: String,
    pub gateway_signature: String,
}

impl SecurityConfig {
    pub fn new(
        project_token: impl Into<String>,
        gateway_secret: impl Into<String>,
        gateway_signature: impl Into<String>,
    ) -> Self {
        Self {
            project_token: project_token.into(),
            gateway_secret: gateway_secret.into(),
            gateway_signature: gateway_signature.into(),
        }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("project_token", &"<redacted>")
            .field("gateway_secret", &"<redacted>")
            .field("gateway_signature", &"<redacted>")
            .finish()
    }
}

/// Deployment environment. Only `DEV` changes behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    Dev,
    #[default]
    Prod,
}

impl Environment {
    fn from_value(value: &str) -> Self {
        if value == "DEV" {
            Self::Dev
        } else {
            Self::Prod
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::from_value(&v))
            .unwrap_or_default()
    }

    fn from_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Upstash Redis REST credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstashConfig {
    pub url: String,
    pub token: String,
}

impl fmt::Debug for UpstashConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstashConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub security: SecurityConfig,
    pub environment: Environment,
    pub nonce_enabled: bool,
    /// `None` selects the in-memory nonce store.
    pub upstash: Option<UpstashConfig>,
    pub upstream_url: url::Url,
    pub allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let security = SecurityConfig::new(
            required(PROJECT_TOKEN_ENV)?,
            required(GATEWAY_SECRET_ENV)?,
            required(GATEWAY_SIGNATURE_ENV)?,
        );

        let upstream_url =
            url::Url::parse(&required(UPSTREAM_URL_ENV)?).map_err(|e| ConfigError::Invalid {
                name: UPSTREAM_URL_ENV,
                reason: e.to_string(),
            })?;

        let upstash = match (get(UPSTASH_URL_ENV), get(UPSTASH_TOKEN_ENV)) {
            (Some(url), Some(token)) => Some(UpstashConfig { url, token }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(UPSTASH_TOKEN_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(UPSTASH_URL_ENV)),
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("{raw:?} is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };

        let allowed_origins = get(ALLOWED_ORIGINS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            security,
            environment: get(ENVIRONMENT_ENV)
                .map(|v| Environment::from_value(&v))
                .unwrap_or_default(),
            nonce_enabled: get(NONCE_ENABLED_ENV).is_some_and(|v| v == "true"),
            upstash,
            upstream_url,
            allowed_origins,
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        })
    }

    /// Replay protection is on only when explicitly enabled outside `DEV`.
    pub fn replay_enabled(&self) -> bool {
        self.nonce_enabled && self.environment != Environment::Dev
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
