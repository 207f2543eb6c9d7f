//! OIDC federation: authorization-code flow with PKCE against an external
//! provider.

use fedrelay_core::FederationEntry;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::config::OidcConfigAccessor;
use crate::error::{FederationError, FederationResult};
use crate::models::UserInfo;
use crate::services::discovery::validate_endpoint_url;
use crate::services::{
    AuthenticationRequestBuilder, AuthorizationCodeExtractor, CallbackParams, MetadataProvider,
};

/// One configured OIDC federation.
///
/// Stateless between calls: the state/verifier pair lives in the caller's
/// session, and the only shared mutable resource is the metadata cache.
#[derive(Clone)]
pub struct OidcFederation {
    id: String,
    accessor: OidcConfigAccessor,
    metadata: MetadataProvider,
    builder: AuthenticationRequestBuilder,
    extractor: AuthorizationCodeExtractor,
    http_client: reqwest::Client,
    allow_insecure: bool,
}

impl OidcFederation {
    /// Build from a federation entry. Fails at construction on a non-OIDC
    /// entry or missing required fields.
    pub fn new(entry: FederationEntry) -> FederationResult<Self> {
        let accessor = OidcConfigAccessor::new(entry)?;
        let client = accessor.client().clone();
        let server = accessor.server().clone();
        let id = accessor.id().to_string();

        let metadata = MetadataProvider::new(server.issuer.clone(), server.allow_insecure);
        let builder = AuthenticationRequestBuilder::new(
            metadata.clone(),
            client.client_id.clone(),
            client.redirect_uri.clone(),
            client.scopes.clone(),
        );
        let extractor = AuthorizationCodeExtractor::new(client.client_id.clone());

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| {
                FederationError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            id,
            accessor,
            metadata,
            builder,
            extractor,
            http_client,
            allow_insecure: server.allow_insecure,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Configuration accessor for this federation.
    #[must_use]
    pub fn config(&self) -> &OidcConfigAccessor {
        &self.accessor
    }

    /// Metadata provider, exposed for seeding and invalidation.
    #[must_use]
    pub fn metadata(&self) -> &MetadataProvider {
        &self.metadata
    }

    /// Build the authentication-request URL for a state/verifier pair owned
    /// by the caller's session. The challenge method is fixed to S256.
    #[instrument(skip(self, code_verifier), fields(federation_id = %self.id))]
    pub async fn create_federation_request(
        &self,
        state: &str,
        code_verifier: &str,
    ) -> FederationResult<Url> {
        self.builder
            .build(state, Some(code_verifier), Some("S256"))
            .await
    }

    /// Process the IdP callback: validate, exchange the code, and fetch the
    /// provider's user info.
    ///
    /// Validation runs before any token exchange; every failure surfaces as
    /// one classified error and no partial user state is returned.
    #[instrument(skip_all, fields(federation_id = %self.id))]
    pub async fn process_federation_response(
        &self,
        params: &CallbackParams,
        expected_state: &str,
        code_verifier: &str,
    ) -> FederationResult<UserInfo> {
        let metadata = self.metadata.get().await?;

        let validated = self.extractor.extract(params, Some(expected_state))?;

        let tokens = self
            .exchange_code(&metadata.token_endpoint, &validated.code, code_verifier)
            .await?;

        let userinfo_endpoint = metadata.userinfo_endpoint.as_ref().ok_or_else(|| {
            FederationError::InvalidConfiguration(format!(
                "issuer '{}' does not advertise a userinfo endpoint",
                metadata.issuer
            ))
        })?;

        let user = self
            .fetch_user_info(userinfo_endpoint, &tokens.access_token)
            .await?;

        tracing::info!(
            federation_id = %self.id,
            subject = %user.subject,
            "Federated authentication completed"
        );

        Ok(user)
    }

    /// Process a callback given the full response URL.
    pub async fn process_federation_response_url(
        &self,
        response_url: &Url,
        expected_state: &str,
        code_verifier: &str,
    ) -> FederationResult<UserInfo> {
        self.process_federation_response(
            &CallbackParams::from_url(response_url),
            expected_state,
            code_verifier,
        )
        .await
    }

    /// Exchange the authorization code for tokens.
    async fn exchange_code(
        &self,
        token_endpoint: &str,
        code: &str,
        code_verifier: &str,
    ) -> FederationResult<TokenResponse> {
        // The token endpoint came from discovered metadata; hold it to the
        // same SSRF rules as the issuer
        validate_endpoint_url(token_endpoint, self.allow_insecure)?;

        let client = self.accessor.client();
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http_client
            .post(token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| FederationError::TokenExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            // SECURITY: Truncate the IdP error body in logs (char-boundary
            // safe) and never pass it through to the caller.
            let truncated = if error_text.len() > 500 {
                let safe_end = error_text
                    .char_indices()
                    .take_while(|(i, _)| *i < 500)
                    .last()
                    .map_or(0, |(i, c)| i + c.len_utf8());
                format!("{}... (truncated)", &error_text[..safe_end])
            } else {
                error_text
            };
            tracing::error!(
                token_endpoint = %token_endpoint,
                status = %status,
                error = %truncated,
                "Token exchange failed"
            );
            return Err(FederationError::TokenExchangeFailed(format!(
                "Token endpoint returned HTTP {status}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| FederationError::TokenExchangeFailed(e.to_string()))?;

        Ok(tokens)
    }

    /// Fetch the provider's user info with the bearer access token.
    async fn fetch_user_info(
        &self,
        userinfo_endpoint: &str,
        access_token: &str,
    ) -> FederationResult<UserInfo> {
        let response = self
            .http_client
            .get(userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| FederationError::UserInfoFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                userinfo_endpoint = %userinfo_endpoint,
                status = %status,
                "User info request failed"
            );
            return Err(FederationError::UserInfoFailed(format!(
                "Userinfo endpoint returned HTTP {status}"
            )));
        }

        let raw: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| FederationError::UserInfoFailed(e.to_string()))?;

        Ok(raw.into())
    }
}

/// Token response from the IdP.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    id_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    refresh_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: Option<i64>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Userinfo response from the IdP.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
    #[serde(flatten)]
    additional: std::collections::HashMap<String, serde_json::Value>,
}

impl From<UserInfoResponse> for UserInfo {
    fn from(raw: UserInfoResponse) -> Self {
        UserInfo {
            subject: raw.sub,
            email: raw.email,
            email_verified: raw.email_verified,
            name: raw.name,
            given_name: raw.given_name,
            family_name: raw.family_name,
            picture: raw.picture,
            additional: raw.additional,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::DiscoveredMetadata;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_entry(issuer: &str) -> FederationEntry {
        serde_json::from_value(json!({
            "id": "fed-1",
            "protocol": "oidc",
            "client": {
                "client_id": "client-abc",
                "client_secret": "s3cret",
                "redirect_uri": "https://rp.example.com/callback/fed-1",
                "scopes": ["openid", "email"]
            },
            "server": {
                "name": "Mock IdP",
                "issuer": issuer,
                "allow_insecure": true
            }
        }))
        .unwrap()
    }

    async fn federation_with_mock(mock_server: &MockServer) -> OidcFederation {
        let issuer = mock_server.uri();
        let federation = OidcFederation::new(test_entry(&issuer)).unwrap();
        federation
            .metadata()
            .seed(DiscoveredMetadata {
                issuer: issuer.clone(),
                authorization_endpoint: format!("{issuer}/authorize"),
                token_endpoint: format!("{issuer}/token"),
                userinfo_endpoint: Some(format!("{issuer}/userinfo")),
                jwks_uri: format!("{issuer}/jwks"),
            })
            .await;
        federation
    }

    fn callback(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(String::from),
            state: state.map(String::from),
            error: None,
            error_description: None,
        }
    }

    #[tokio::test]
    async fn test_create_federation_request_pins_s256() {
        let mock_server = MockServer::start().await;
        let federation = federation_with_mock(&mock_server).await;

        let url = federation
            .create_federation_request("the-state", "the-verifier-value-for-tests-1234567890ab")
            .await
            .unwrap();

        let q: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["state"], "the-state");
        assert_eq!(q["code_challenge_method"], "S256");
        assert_ne!(q["code_challenge"], "the-verifier-value-for-tests-1234567890ab");
    }

    #[tokio::test]
    async fn test_process_response_happy_path() {
        let mock_server = MockServer::start().await;
        let federation = federation_with_mock(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "alice",
                "email": "alice@example.com",
                "email_verified": true
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let user = federation
            .process_federation_response(
                &callback(Some("abc"), Some("xyz")),
                "xyz",
                "the-verifier",
            )
            .await
            .unwrap();

        assert_eq!(user.subject, "alice");
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.qualified_subject("fed-1"), "alice@fed-1");
    }

    #[tokio::test]
    async fn test_state_mismatch_never_reaches_token_endpoint() {
        let mock_server = MockServer::start().await;
        let federation = federation_with_mock(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = federation
            .process_federation_response(
                &callback(Some("abc"), Some("attacker")),
                "xyz",
                "the-verifier",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::InvalidState));
    }

    #[tokio::test]
    async fn test_missing_code_never_reaches_token_endpoint() {
        let mock_server = MockServer::start().await;
        let federation = federation_with_mock(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = federation
            .process_federation_response(&callback(None, Some("xyz")), "xyz", "v")
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::InvalidCallback(_)));
    }

    #[tokio::test]
    async fn test_token_endpoint_failure_is_classified() {
        let mock_server = MockServer::start().await;
        let federation = federation_with_mock(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&mock_server)
            .await;

        let err = federation
            .process_federation_response(&callback(Some("abc"), Some("xyz")), "xyz", "v")
            .await
            .unwrap_err();
        match err {
            FederationError::TokenExchangeFailed(msg) => {
                // Generic message only; no IdP body reflected
                assert!(msg.contains("HTTP"));
                assert!(!msg.contains("invalid_grant"));
            }
            other => panic!("expected TokenExchangeFailed, got {other:?}"),
        }
    }
}
