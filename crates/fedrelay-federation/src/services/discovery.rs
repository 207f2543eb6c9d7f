//! OIDC discovery against a configured issuer.

use crate::error::{FederationError, FederationResult};
use openidconnect::{core::CoreProviderMetadata, IssuerUrl};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::instrument;

/// Discovered provider metadata, reduced to the endpoints this subsystem
/// consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: Option<String>,
    pub jwks_uri: String,
}

/// OIDC discovery service.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryService {
    /// Relax transport-security enforcement (scheme + private-address
    /// checks) for non-production issuers. Defaults to false.
    allow_insecure: bool,
}

impl DiscoveryService {
    #[must_use]
    pub fn new(allow_insecure: bool) -> Self {
        if allow_insecure {
            tracing::warn!(
                "Discovery transport-security enforcement is DISABLED; never enable outside development"
            );
        }
        Self { allow_insecure }
    }

    /// Fetch and parse provider metadata from the issuer's well-known
    /// configuration document.
    #[instrument(skip(self), fields(issuer = %issuer_url))]
    pub async fn discover(&self, issuer_url: &str) -> FederationResult<DiscoveredMetadata> {
        let issuer_url = issuer_url.trim_end_matches('/');

        validate_endpoint_url(issuer_url, self.allow_insecure)?;

        let issuer = IssuerUrl::new(issuer_url.to_string()).map_err(|e| {
            FederationError::InvalidConfiguration(format!("Invalid issuer URL: {e}"))
        })?;

        // No redirects: discovery must land on the configured issuer itself
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| {
                FederationError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;

        let metadata = CoreProviderMetadata::discover_async(issuer, &http_client)
            .await
            .map_err(|e| FederationError::DiscoveryFailed {
                issuer: issuer_url.to_string(),
                message: e.to_string(),
            })?;

        let discovered = DiscoveredMetadata {
            issuer: metadata.issuer().url().to_string(),
            authorization_endpoint: metadata.authorization_endpoint().url().to_string(),
            token_endpoint: metadata
                .token_endpoint()
                .ok_or_else(|| FederationError::DiscoveryFailed {
                    issuer: issuer_url.to_string(),
                    message: "Token endpoint not found".to_string(),
                })?
                .url()
                .to_string(),
            userinfo_endpoint: metadata.userinfo_endpoint().map(|e| e.url().to_string()),
            jwks_uri: metadata.jwks_uri().url().to_string(),
        };

        // Discovered endpoints are attacker-influenced on a compromised
        // issuer; hold them to the same SSRF rules as the issuer itself.
        validate_endpoint_url(&discovered.token_endpoint, self.allow_insecure)?;
        if let Some(userinfo) = &discovered.userinfo_endpoint {
            validate_endpoint_url(userinfo, self.allow_insecure)?;
        }

        tracing::info!(
            authorization_endpoint = %discovered.authorization_endpoint,
            token_endpoint = %discovered.token_endpoint,
            "Discovered OIDC endpoints"
        );

        Ok(discovered)
    }

    /// Well-known configuration URL for an issuer.
    #[must_use]
    pub fn well_known_url(issuer_url: &str) -> String {
        let issuer_url = issuer_url.trim_end_matches('/');
        format!("{issuer_url}/.well-known/openid-configuration")
    }
}

/// SSRF protection for IdP-facing URLs: HTTPS only, no internal or private
/// targets. `allow_insecure` bypasses both checks for development issuers.
pub(crate) fn validate_endpoint_url(url_str: &str, allow_insecure: bool) -> FederationResult<()> {
    if allow_insecure {
        return Ok(());
    }

    let url = url::Url::parse(url_str).map_err(|e| {
        FederationError::InvalidConfiguration(format!("Invalid URL '{url_str}': {e}"))
    })?;

    let scheme = url.scheme();
    if scheme != "https" {
        return Err(FederationError::InvalidConfiguration(format!(
            "Only HTTPS is allowed for IdP URLs, got: {scheme}"
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| FederationError::InvalidConfiguration("URL has no host".to_string()))?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        match ip {
            IpAddr::V4(v4) => {
                if v4.is_loopback()
                    || v4.is_private()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_unspecified()
                    || v4.is_documentation()
                {
                    return Err(FederationError::InvalidConfiguration(format!(
                        "Internal/private IP not allowed: {host}"
                    )));
                }
            }
            IpAddr::V6(v6) => {
                let segs = v6.segments();
                if v6.is_loopback()
                    || v6.is_unspecified()
                    || (segs[0] & 0xfe00) == 0xfc00
                    || (segs[0] & 0xffc0) == 0xfe80
                {
                    return Err(FederationError::InvalidConfiguration(format!(
                        "Internal/private IP not allowed: {host}"
                    )));
                }
            }
        }
    } else {
        let lower = host.to_lowercase();
        let blocked = [
            "localhost",
            "metadata.google.internal",
            "metadata.goog",
            "169.254.169.254",
        ];
        for b in blocked {
            if lower == b || lower.ends_with(&format!(".{b}")) {
                return Err(FederationError::InvalidConfiguration(format!(
                    "Blocked hostname: {host}"
                )));
            }
        }
    }

    Ok(())
}
