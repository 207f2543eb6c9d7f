//! Router for the federation surface.

use std::sync::Arc;

use axum::{routing::get, Router};
use fedrelay_core::SharedSessionStore;

use crate::federation::FederationManager;
use crate::handlers::federation as handlers;

/// Shared state for federation handlers.
#[derive(Clone)]
pub struct FederationState {
    /// Federation registry, built eagerly at startup.
    pub manager: Arc<FederationManager>,
    /// Session store holding callback bindings and the signed-in user.
    pub sessions: SharedSessionStore,
}

impl FederationState {
    #[must_use]
    pub fn new(manager: Arc<FederationManager>, sessions: SharedSessionStore) -> Self {
        Self { manager, sessions }
    }
}

/// Create the federation authentication routes.
///
/// Routes:
/// - GET  /auth/federation/:federation_id/login - Initiate a federated login
/// - GET  /auth/federation/:federation_id/callback - OIDC callback
/// - POST /auth/federation/:federation_id/callback - SAML2 ACS
pub fn auth_routes() -> Router<FederationState> {
    Router::new()
        .route(
            "/auth/federation/:federation_id/login",
            get(handlers::initiate),
        )
        .route(
            "/auth/federation/:federation_id/callback",
            get(handlers::oidc_callback).post(handlers::saml2_callback),
        )
}

/// Create the full federation router with its state applied.
pub fn federation_router(state: FederationState) -> Router {
    auth_routes().with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedrelay_core::InMemorySessionStore;

    #[test]
    fn test_auth_routes_created() {
        // Route construction must not panic
        let _routes = auth_routes();
    }

    #[test]
    fn test_router_with_empty_registry() {
        let manager = FederationManager::from_entries(Vec::new()).unwrap();
        let state = FederationState::new(
            Arc::new(manager),
            Arc::new(InMemorySessionStore::new()),
        );
        let _router = federation_router(state);
    }
}
