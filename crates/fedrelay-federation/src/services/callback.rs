//! Authorization-response validation for the OIDC callback.
//!
//! This is the security checkpoint on the callback path: a response is
//! rejected for an IdP error, a state mismatch, or a missing code BEFORE any
//! token exchange is attempted.

use crate::error::{FederationError, FederationResult};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

/// Query parameters the IdP may send to the callback endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse from a callback URL's query string.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Validated authorization-response parameters.
#[derive(Debug, Clone)]
pub struct ValidatedAuthParams {
    pub code: String,
    pub state: Option<String>,
}

/// Validates the IdP's authorization response for one federation.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeExtractor {
    client_id: String,
}

impl AuthorizationCodeExtractor {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// Validate callback parameters against the expected state.
    #[instrument(skip(self, params, expected_state), fields(client_id = %self.client_id))]
    pub fn extract(
        &self,
        params: &CallbackParams,
        expected_state: Option<&str>,
    ) -> FederationResult<ValidatedAuthParams> {
        // An error response never proceeds to token exchange
        if let Some(error) = &params.error {
            return Err(FederationError::IdpError {
                error: error.clone(),
                description: params.error_description.clone(),
            });
        }

        // State binding: fail closed on any mismatch, including an absent
        // state when one is expected
        if let Some(expected) = expected_state {
            if params.state.as_deref() != Some(expected) {
                tracing::warn!("Callback state does not match expected state");
                return Err(FederationError::InvalidState);
            }
        }

        let code = params.code.clone().ok_or_else(|| {
            FederationError::InvalidCallback("Missing authorization code".to_string())
        })?;

        Ok(ValidatedAuthParams {
            code,
            state: params.state.clone(),
        })
    }

    /// Validate a full callback URL.
    pub fn extract_from_url(
        &self,
        response_url: &Url,
        expected_state: Option<&str>,
    ) -> FederationResult<ValidatedAuthParams> {
        self.extract(&CallbackParams::from_url(response_url), expected_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> AuthorizationCodeExtractor {
        AuthorizationCodeExtractor::new("client-abc")
    }

    fn callback_url(query: &str) -> Url {
        Url::parse(&format!("https://rp.example.com/callback/fed-1?{query}")).unwrap()
    }

    #[test]
    fn test_valid_callback_extracts_code_and_state() {
        let url = callback_url("code=abc&state=xyz");
        let params = extractor().extract_from_url(&url, Some("xyz")).unwrap();
        assert_eq!(params.code, "abc");
        assert_eq!(params.state.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_state_mismatch_rejected() {
        let url = callback_url("code=abc&state=attacker");
        let err = extractor().extract_from_url(&url, Some("xyz")).unwrap_err();
        assert!(matches!(err, FederationError::InvalidState));
    }

    #[test]
    fn test_absent_state_rejected_when_expected() {
        let url = callback_url("code=abc");
        let err = extractor().extract_from_url(&url, Some("xyz")).unwrap_err();
        assert!(matches!(err, FederationError::InvalidState));
    }

    #[test]
    fn test_missing_code_rejected() {
        let url = callback_url("state=xyz");
        let err = extractor().extract_from_url(&url, Some("xyz")).unwrap_err();
        assert!(matches!(err, FederationError::InvalidCallback(_)));
    }

    #[test]
    fn test_error_response_rejected_before_state_check() {
        // Even with a matching state, an error parameter wins
        let url = callback_url("error=access_denied&error_description=nope&state=xyz");
        let err = extractor().extract_from_url(&url, Some("xyz")).unwrap_err();
        match err {
            FederationError::IdpError { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("nope"));
            }
            other => panic!("expected IdpError, got {other:?}"),
        }
    }

    #[test]
    fn test_no_expected_state_skips_state_check() {
        let url = callback_url("code=abc");
        let params = extractor().extract_from_url(&url, None).unwrap();
        assert_eq!(params.code, "abc");
        assert_eq!(params.state, None);
    }
}
