// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use axum::{extract::Request, ServiceExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use moderation_gate::{
    api,
    auth::HttpIdentityProvider,
    cache::Cache,
    clock::SystemClock,
    config::Config,
    state::AppState,
    storage::InMemoryAuditorDirectory,
    telemetry,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Read before tracing starts so `.env` can set RUST_LOG and LOG_FORMAT.
    let dotenv = dotenvy::dotenv();
    telemetry::init_tracing();
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => info!("No .env file found"),
        Err(e) => warn!(error = %e, "Failed to read .env file, continuing without it"),
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env().map_err(|e| format!("Invalid configuration: {e}"))?;

    let directory = InMemoryAuditorDirectory::load_or_empty(&config.auditors_file)
        .await
        .map_err(|e| {
            format!(
                "Failed to load auditors from {}: {e}",
                config.auditors_file.display()
            )
        })?;
    info!(
        auditors = directory.len().await,
        path = %config.auditors_file.display(),
        "Auditor directory loaded"
    );

    let clock = Arc::new(SystemClock);
    let cache = Cache::from_config(&config, clock.clone())
        .map_err(|e| format!("Failed to set up cache backend: {e}"))?;
    let provider = HttpIdentityProvider::new(&config.identity_provider_url, config.upstream_timeout)
        .map_err(|e| format!("Failed to set up identity provider client: {e}"))?;

    let bind_addr = config.bind_addr();
    info!(
        api_host = %config.api_host,
        identity_provider = %config.identity_provider_url,
        cache = cache.mode(),
        "Moderation gate configured"
    );

    let state = AppState::new(
        config,
        cache,
        Arc::new(provider),
        Arc::new(directory),
        clock,
    )
    .map_err(|e| format!("Failed to initialise report keys: {e}"))?;
    let app = api::service(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {bind_addr}: {e}"))?;
    info!("Moderation gate listening on http://{bind_addr} (docs at /docs)");

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| format!("Server error: {e}"))?;

    info!("Moderation gate stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
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
    info!("Shutdown signal received");
    shutdown.cancel();
}
