//! OIDC authentication-request construction.

use crate::error::{FederationError, FederationResult};
use crate::services::metadata::MetadataProvider;
use openidconnect::{PkceCodeChallenge, PkceCodeVerifier};
use url::Url;

/// PKCE code-challenge method.
///
/// Anything other than an explicit `S256` degrades to `plain`, where the
/// challenge is the verifier itself, unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceMethod {
    S256,
    Plain,
}

impl PkceMethod {
    /// Interpret a caller-supplied method parameter.
    #[must_use]
    pub fn from_param(method: Option<&str>) -> Self {
        match method {
            Some("S256") => Self::S256,
            _ => Self::Plain,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

/// Builds the authorization URL for one OIDC federation.
///
/// The authorization endpoint resolves through the metadata provider, so the
/// first build may perform a discovery fetch; resolver failures propagate
/// unchanged.
#[derive(Clone)]
pub struct AuthenticationRequestBuilder {
    metadata: MetadataProvider,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl AuthenticationRequestBuilder {
    #[must_use]
    pub fn new(
        metadata: MetadataProvider,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            metadata,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
        }
    }

    /// Construct the authentication-request URL for the given state and
    /// optional PKCE verifier/method.
    ///
    /// Absent optional parameters are dropped entirely: the query never
    /// contains a literal `"null"` or `"undefined"`.
    pub async fn build(
        &self,
        state: &str,
        verifier: Option<&str>,
        method: Option<&str>,
    ) -> FederationResult<Url> {
        let metadata = self.metadata.get().await?;

        let mut url = Url::parse(&metadata.authorization_endpoint)
            .map_err(|e| FederationError::InvalidConfiguration(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.scopes.join(" "));
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("state", state);

            if let Some(verifier) = verifier {
                let method = PkceMethod::from_param(method);
                let challenge = match method {
                    PkceMethod::S256 => PkceCodeChallenge::from_code_verifier_sha256(
                        &PkceCodeVerifier::new(verifier.to_string()),
                    )
                    .as_str()
                    .to_string(),
                    PkceMethod::Plain => verifier.to_string(),
                };
                query.append_pair("code_challenge", &challenge);
                query.append_pair("code_challenge_method", method.as_str());
            }
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::discovery::DiscoveredMetadata;
    use std::collections::HashMap;

    async fn builder() -> AuthenticationRequestBuilder {
        let provider = MetadataProvider::new("https://idp.example.com", false);
        // Seeding avoids any network access from the builder tests
        provider
            .seed(DiscoveredMetadata {
                issuer: "https://idp.example.com".to_string(),
                authorization_endpoint: "https://idp.example.com/authorize".to_string(),
                token_endpoint: "https://idp.example.com/token".to_string(),
                userinfo_endpoint: Some("https://idp.example.com/userinfo".to_string()),
                jwks_uri: "https://idp.example.com/jwks".to_string(),
            })
            .await;
        AuthenticationRequestBuilder::new(
            provider,
            "client-abc",
            "https://rp.example.com/callback/fed-1",
            vec!["openid".to_string(), "email".to_string()],
        )
    }

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_s256_method_applies_transform() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let url = builder().await
            .build("state-1", Some(verifier), Some("S256"))
            .await
            .unwrap();
        let q = query_map(&url);

        assert_eq!(q["code_challenge_method"], "S256");
        // Challenge is the transform, never the raw verifier
        assert_ne!(q["code_challenge"], verifier);
        let expected = PkceCodeChallenge::from_code_verifier_sha256(&PkceCodeVerifier::new(
            verifier.to_string(),
        ));
        assert_eq!(q["code_challenge"], expected.as_str());
    }

    #[tokio::test]
    async fn test_plain_method_uses_verifier_unchanged() {
        let verifier = "plain-verifier-value";
        let url = builder().await
            .build("state-1", Some(verifier), Some("plain"))
            .await
            .unwrap();
        let q = query_map(&url);
        assert_eq!(q["code_challenge_method"], "plain");
        assert_eq!(q["code_challenge"], verifier);
    }

    #[tokio::test]
    async fn test_unknown_method_defaults_to_plain() {
        let verifier = "v";
        let url = builder().await
            .build("state-1", Some(verifier), Some("S512"))
            .await
            .unwrap();
        let q = query_map(&url);
        assert_eq!(q["code_challenge_method"], "plain");
        assert_eq!(q["code_challenge"], verifier);
    }

    #[tokio::test]
    async fn test_no_verifier_omits_pkce_parameters() {
        let url = builder().await.build("state-1", None, None).await.unwrap();
        let q = query_map(&url);
        assert!(!q.contains_key("code_challenge"));
        assert!(!q.contains_key("code_challenge_method"));
    }

    #[tokio::test]
    async fn test_core_parameters_present_and_no_null_literals() {
        let url = builder().await.build("the-state", None, None).await.unwrap();
        let q = query_map(&url);

        assert_eq!(q["response_type"], "code");
        assert_eq!(q["scope"], "openid email");
        assert_eq!(q["client_id"], "client-abc");
        assert_eq!(q["redirect_uri"], "https://rp.example.com/callback/fed-1");
        assert_eq!(q["state"], "the-state");

        let raw = url.query().unwrap();
        assert!(!raw.contains("null"));
        assert!(!raw.contains("undefined"));
    }
}
