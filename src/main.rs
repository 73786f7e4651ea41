// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{process::ExitCode, sync::Arc};

use graphql_gateway_guard::{
    api::router,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    graphql::upstream::ForwardingExecutor,
    replay::{InMemoryNonceStore, NonceStore, NonceSweeper, ReplayGuard, UpstashNonceStore},
    state::AppState,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Build the replay guard, spawning the in-memory sweeper when needed.
fn build_replay_guard(
    config: &AppConfig,
    shutdown: &CancellationToken,
) -> Result<Option<ReplayGuard>, Box<dyn std::error::Error>> {
    if !config.replay_enabled() {
        info!(
            environment = ?config.environment,
            nonce_enabled = config.nonce_enabled,
            "Replay protection disabled"
        );
        return Ok(None);
    }

    let store: Arc<dyn NonceStore> = match &config.upstash {
        Some(upstash) => {
            info!(url = %upstash.url, "Replay protection enabled (Upstash Redis)");
            Arc::new(UpstashNonceStore::new(&upstash.url, &upstash.token)?)
        }
        None => {
            warn!("Replay protection enabled with an in-memory store; nonces are not shared between instances");
            let store = Arc::new(InMemoryNonceStore::default());
            tokio::spawn(NonceSweeper::new(store.clone()).run(shutdown.clone()));
            store
        }
    };

    Ok(Some(ReplayGuard::new(store)))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let shutdown = CancellationToken::new();

    let replay = build_replay_guard(&config, &shutdown)?;
    let executor = ForwardingExecutor::new(config.upstream_url.clone())?;
    info!(upstream = %executor.endpoint(), "Forwarding GraphQL requests");

    let state = AppState::new(&config.security, replay, Arc::new(executor))?;
    let app = router(state, config.allowed_origins.clone());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "GraphQL gateway guard listening (docs at /docs)");

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        server_shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
