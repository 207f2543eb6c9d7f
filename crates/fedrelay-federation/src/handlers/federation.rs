//! Initiation and callback handlers.
//!
//! The state/verifier pair is logically part of the OIDC state machine but
//! physically lives in the caller's session: written once at initiation,
//! consumed exactly once at callback (removed before processing, so a
//! replayed or duplicate callback finds nothing and fails closed).

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{FederationError, FederationResult};
use crate::federation::{Federation, LoginRequest};
use crate::models::{FederationLoginResponse, UserInfo};
use crate::router::FederationState;
use crate::security;
use crate::services::CallbackParams;

/// Session-held binding between initiation and callback.
///
/// For OIDC the verifier slot carries the PKCE code verifier; for SAML2 it
/// carries the AuthnRequest id used for InResponseTo verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackBinding {
    pub state: String,
    pub code_verifier: String,
}

fn binding_key(federation_id: &str) -> String {
    format!("federation:binding:{federation_id}")
}

async fn store_binding(
    state: &FederationState,
    federation_id: &str,
    binding: &CallbackBinding,
) -> FederationResult<()> {
    let value = serde_json::to_value(binding)
        .map_err(|e| FederationError::Internal(format!("Failed to encode binding: {e}")))?;
    state.sessions.set(&binding_key(federation_id), value).await?;
    Ok(())
}

/// Consume the binding for this federation. The entry is removed before the
/// response is processed, so it is cleared on success and failure alike.
async fn take_binding(
    state: &FederationState,
    federation_id: &str,
) -> FederationResult<CallbackBinding> {
    let value = state
        .sessions
        .remove(&binding_key(federation_id))
        .await?
        .ok_or(FederationError::MissingCallbackBinding)?;
    serde_json::from_value(value)
        .map_err(|e| FederationError::Internal(format!("Failed to decode binding: {e}")))
}

/// Write the authenticated user into the session.
async fn finalize_session(
    state: &FederationState,
    federation_id: &str,
    user: &UserInfo,
) -> FederationResult<String> {
    let subject = user.qualified_subject(federation_id);
    let mut batch = std::collections::HashMap::new();
    batch.insert(
        "user.subject".to_string(),
        serde_json::Value::String(subject.clone()),
    );
    batch.insert(
        "user.federation_id".to_string(),
        serde_json::Value::String(federation_id.to_string()),
    );
    batch.insert(
        "user.auth_time".to_string(),
        serde_json::Value::from(Utc::now().timestamp()),
    );
    state.sessions.set_batch(batch).await?;
    Ok(subject)
}

/// Start a federated login.
///
/// GET /auth/federation/:federation_id/login
#[instrument(skip(state))]
pub async fn initiate(
    State(state): State<FederationState>,
    Path(federation_id): Path<String>,
) -> FederationResult<Response> {
    let federation = state.manager.get(&federation_id)?;

    match federation {
        Federation::Oidc(oidc) => {
            let login_state = security::generate_state();
            let code_verifier = security::generate_code_verifier();

            let url = oidc
                .create_federation_request(&login_state, &code_verifier)
                .await?;

            store_binding(
                &state,
                &federation_id,
                &CallbackBinding {
                    state: login_state,
                    code_verifier,
                },
            )
            .await?;

            tracing::info!(federation_id = %federation_id, "OIDC federation login initiated");
            Ok(Redirect::temporary(url.as_str()).into_response())
        }
        Federation::Saml2(saml2) => {
            let relay_state = security::generate_state();
            let (login, request_id) = saml2.process_login_request(&relay_state)?;

            store_binding(
                &state,
                &federation_id,
                &CallbackBinding {
                    state: relay_state,
                    code_verifier: request_id,
                },
            )
            .await?;

            tracing::info!(federation_id = %federation_id, "SAML2 federation login initiated");
            Ok(match login {
                LoginRequest::Redirect { location } => {
                    Redirect::temporary(&location).into_response()
                }
                LoginRequest::Post { html } => Html(html).into_response(),
            })
        }
    }
}

/// Handle the OIDC callback from the external IdP.
///
/// GET /auth/federation/:federation_id/callback
#[instrument(skip(state, params))]
pub async fn oidc_callback(
    State(state): State<FederationState>,
    Path(federation_id): Path<String>,
    Query(params): Query<CallbackParams>,
) -> FederationResult<Json<FederationLoginResponse>> {
    let federation = state.manager.get(&federation_id)?;
    let Federation::Oidc(oidc) = federation else {
        return Err(FederationError::InvalidCallback(
            "Federation does not accept OIDC callbacks".to_string(),
        ));
    };

    let binding = take_binding(&state, &federation_id).await?;

    let user = oidc
        .process_federation_response(&params, &binding.state, &binding.code_verifier)
        .await?;

    let subject = finalize_session(&state, &federation_id, &user).await?;

    tracing::info!(
        federation_id = %federation_id,
        subject = %subject,
        "Federation login successful"
    );

    Ok(Json(FederationLoginResponse {
        subject,
        federation_id,
    }))
}

/// SAML2 Assertion Consumer Service form body.
#[derive(Debug, Deserialize)]
pub struct Saml2CallbackForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Handle the SAML2 response POSTed by the external IdP.
///
/// POST /auth/federation/:federation_id/callback
#[instrument(skip(state, form))]
pub async fn saml2_callback(
    State(state): State<FederationState>,
    Path(federation_id): Path<String>,
    Form(form): Form<Saml2CallbackForm>,
) -> FederationResult<Json<FederationLoginResponse>> {
    let federation = state.manager.get(&federation_id)?;
    let Federation::Saml2(saml2) = federation else {
        return Err(FederationError::InvalidCallback(
            "Federation does not accept SAML2 responses".to_string(),
        ));
    };

    let binding = take_binding(&state, &federation_id).await?;

    // RelayState plays the role of the OIDC state parameter
    if form.relay_state.as_deref() != Some(binding.state.as_str()) {
        tracing::warn!(federation_id = %federation_id, "RelayState mismatch on SAML2 callback");
        return Err(FederationError::InvalidState);
    }

    let user =
        saml2.process_saml2_response(&form.saml_response, Some(binding.code_verifier.as_str()))?;

    let subject = finalize_session(&state, &federation_id, &user).await?;

    tracing::info!(
        federation_id = %federation_id,
        subject = %subject,
        "Federation login successful"
    );

    Ok(Json(FederationLoginResponse {
        subject,
        federation_id,
    }))
}
