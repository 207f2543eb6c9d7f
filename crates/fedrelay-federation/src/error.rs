//! Error types for the federation subsystem.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for federation operations.
pub type FederationResult<T> = Result<T, FederationError>;

/// Federation error types.
#[derive(Debug, Error)]
pub enum FederationError {
    // Configuration errors (fatal, surfaced at registry construction)
    #[error(transparent)]
    Config(#[from] fedrelay_core::ConfigValidationError),

    #[error("Invalid federation configuration: {0}")]
    InvalidConfiguration(String),

    // Lookup errors
    #[error("Federation not found: {0}")]
    FederationNotFound(String),

    // Callback validation errors
    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    #[error("No pending authentication for this federation")]
    MissingCallbackBinding,

    #[error("Authentication failed at IdP: {error}")]
    IdpError {
        error: String,
        description: Option<String>,
    },

    // Upstream errors
    #[error("Discovery failed for issuer {issuer}: {message}")]
    DiscoveryFailed { issuer: String, message: String },

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("User info request failed: {0}")]
    UserInfoFailed(String),

    #[error("SAML2 response validation failed: {0}")]
    Saml2ResponseInvalid(String),

    // Infrastructure errors
    #[error(transparent)]
    Session(#[from] fedrelay_core::SessionError),

    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for FederationError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            // 400 Bad Request
            FederationError::InvalidState => (
                StatusCode::BAD_REQUEST,
                "invalid_state",
                "Invalid state parameter".to_string(),
            ),
            FederationError::InvalidCallback(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_callback", msg.clone())
            }
            FederationError::MissingCallbackBinding => (
                StatusCode::BAD_REQUEST,
                "missing_callback_binding",
                "No pending authentication for this federation".to_string(),
            ),
            FederationError::IdpError { error, description } => {
                // SECURITY: Never reflect IdP-controlled error/description in
                // the response body. Debug format prevents log injection via
                // control characters.
                tracing::warn!(
                    idp_error = ?error,
                    idp_description = ?description,
                    "IdP returned error (not reflected to client)"
                );
                (
                    StatusCode::BAD_REQUEST,
                    "idp_error",
                    "The identity provider returned an error".to_string(),
                )
            }

            // 404 Not Found
            FederationError::FederationNotFound(id) => (
                StatusCode::NOT_FOUND,
                "federation_not_found",
                format!("Federation {id} not found"),
            ),

            // 422 Unprocessable Entity (upstream failures; user can retry)
            FederationError::DiscoveryFailed { issuer, message } => {
                tracing::warn!("Discovery failed for {issuer}: {message}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "discovery_failed",
                    "Failed to discover endpoints for the configured issuer".to_string(),
                )
            }
            FederationError::TokenExchangeFailed(msg) => {
                tracing::error!("Token exchange failed: {}", msg);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "token_exchange_failed",
                    "Token exchange with identity provider failed".to_string(),
                )
            }
            FederationError::UserInfoFailed(msg) => {
                tracing::error!("User info request failed: {}", msg);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "user_info_failed",
                    "Could not retrieve user information from identity provider".to_string(),
                )
            }
            FederationError::Saml2ResponseInvalid(msg) => {
                tracing::warn!("SAML2 response validation failed: {}", msg);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "saml2_response_invalid",
                    "SAML2 response validation failed".to_string(),
                )
            }

            // 500 Internal Server Error
            FederationError::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "Federation is misconfigured".to_string(),
                )
            }
            FederationError::InvalidConfiguration(msg) => {
                tracing::error!("Invalid configuration: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "Federation is misconfigured".to_string(),
                )
            }
            FederationError::Session(e) => {
                tracing::error!("Session store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "session_error",
                    "Session operation failed".to_string(),
                )
            }
            FederationError::HttpRequest(msg) => {
                tracing::error!("HTTP request error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "http_error",
                    "Failed to communicate with external service".to_string(),
                )
            }
            FederationError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for FederationError {
    fn from(err: reqwest::Error) -> Self {
        FederationError::HttpRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let resp = FederationError::FederationNotFound("nope".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_errors_map_to_400() {
        assert_eq!(
            FederationError::InvalidState.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FederationError::MissingCallbackBinding
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_upstream_errors_map_to_422() {
        let resp = FederationError::TokenExchangeFailed("boom".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_error_maps_to_500() {
        let resp = FederationError::Internal("details stay server-side".to_string())
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
