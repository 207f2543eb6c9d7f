//! fedrelay server
//!
//! A relying-party federation service built with Axum: delegates end-user
//! authentication to configured external identity providers (OIDC or SAML2)
//! and exposes the initiation and callback endpoints.

mod config;
mod logging;

use std::sync::Arc;

use config::Config;
use fedrelay_core::InMemorySessionStore;
use fedrelay_federation::{federation_router, FederationManager, FederationState};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        env = %config.app_env,
        federations = config.federations.len(),
        "Starting fedrelay server"
    );

    // Refuse insecure transport overrides in production
    match config.validate_security_config() {
        Ok(warnings) => {
            for warning in &warnings {
                tracing::warn!(target: "security", "{}", warning);
            }
        }
        Err(errors) => {
            for error in &errors {
                tracing::error!(target: "security", "{}", error);
            }
            eprintln!(
                "FATAL: {} insecure federation setting(s) detected in production mode.",
                errors.len()
            );
            std::process::exit(1);
        }
    }

    // Eager registry construction: misconfiguration stops startup here
    let manager = match FederationManager::from_entries(config.federations.clone()) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("Failed to build federation registry: {e}");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let state = FederationState::new(
        Arc::new(manager),
        Arc::new(InMemorySessionStore::new()),
    );
    let app = federation_router(state);

    let bind_addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {bind_addr}: {e}");
            eprintln!("Error: failed to bind {bind_addr}: {e}");
            std::process::exit(1);
        }
    };

    info!(addr = %bind_addr, "fedrelay server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
