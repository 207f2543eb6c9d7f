//! Static federation configuration model.
//!
//! One [`FederationEntry`] describes one configured external identity
//! provider. Entries are immutable once loaded and owned by the process-wide
//! federation registry. The `protocol` field gates which variant of the
//! client/server settings is semantically valid; [`FederationEntry::validate`]
//! enforces that at load time so misconfiguration surfaces at startup.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Federation protocol selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Oidc,
    Saml2,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oidc => write!(f, "oidc"),
            Self::Saml2 => write!(f, "saml2"),
        }
    }
}

/// SAML2 message delivery binding for the login request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Saml2Binding {
    #[default]
    Redirect,
    Post,
}

/// Relying-party (client) settings for an OIDC federation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcClientSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Scopes requested at the authorization endpoint.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Expected signing algorithm for the ID token. An explicit JSON `null`
    /// is preserved and distinguishable from the field being absent.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub id_token_signed_response_alg: Option<Option<String>>,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string()]
}

/// Deserialize a field that must distinguish "absent" (outer `None`) from
/// an explicit `null` (inner `None`).
fn double_option<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

/// Provider-side settings for an OIDC federation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcServerSettings {
    pub name: String,
    /// Issuer URL used for metadata discovery.
    pub issuer: String,
    /// Relax transport-security enforcement for the discovery request.
    /// Must stay off outside development.
    #[serde(default)]
    pub allow_insecure: bool,
}

/// Service-provider settings for a SAML2 federation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saml2ClientSettings {
    pub sp_entity_id: String,
    /// Assertion Consumer Service URL the IdP posts the response to.
    pub acs_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_id_format: Option<String>,
}

/// Identity-provider settings for a SAML2 federation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saml2ServerSettings {
    pub name: String,
    pub idp_entity_id: String,
    /// IdP Single Sign-On endpoint.
    pub sso_url: String,
    /// IdP X.509 signing certificate (PEM).
    pub certificate: String,
    #[serde(default)]
    pub binding: Saml2Binding,
}

/// Protocol-variant client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientSettings {
    Oidc(OidcClientSettings),
    Saml2(Saml2ClientSettings),
}

/// Protocol-variant server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerSettings {
    Oidc(OidcServerSettings),
    Saml2(Saml2ServerSettings),
}

/// Configuration validation failure. Fatal: surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("federation '{id}': unsupported protocol for this accessor: {protocol}")]
    UnsupportedProtocol { id: String, protocol: String },

    #[error("federation '{id}': {field} settings do not match protocol '{protocol}'")]
    ProtocolMismatch {
        id: String,
        protocol: String,
        field: &'static str,
    },

    #[error("federation '{id}': missing required field: {field}")]
    MissingField { id: String, field: &'static str },

    #[error("federation id must not be empty")]
    EmptyId,
}

/// One configured external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationEntry {
    pub id: String,
    pub protocol: Protocol,
    pub client: ClientSettings,
    pub server: ServerSettings,
}

impl FederationEntry {
    /// Validate protocol/variant coherence and required fields.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.id.is_empty() {
            return Err(ConfigValidationError::EmptyId);
        }
        match self.protocol {
            Protocol::Oidc => {
                let client = self.oidc_client()?;
                let server = self.oidc_server()?;
                if client.client_id.is_empty() {
                    return Err(self.missing("client.client_id"));
                }
                if client.redirect_uri.is_empty() {
                    return Err(self.missing("client.redirect_uri"));
                }
                if server.issuer.is_empty() {
                    return Err(self.missing("server.issuer"));
                }
            }
            Protocol::Saml2 => {
                let client = self.saml2_client()?;
                let server = self.saml2_server()?;
                if client.sp_entity_id.is_empty() {
                    return Err(self.missing("client.sp_entity_id"));
                }
                if client.acs_url.is_empty() {
                    return Err(self.missing("client.acs_url"));
                }
                if server.sso_url.is_empty() {
                    return Err(self.missing("server.sso_url"));
                }
                if server.certificate.is_empty() {
                    return Err(self.missing("server.certificate"));
                }
            }
        }
        Ok(())
    }

    fn missing(&self, field: &'static str) -> ConfigValidationError {
        ConfigValidationError::MissingField {
            id: self.id.clone(),
            field,
        }
    }

    /// OIDC client settings; fails when the entry is not an OIDC federation.
    pub fn oidc_client(&self) -> Result<&OidcClientSettings, ConfigValidationError> {
        match (&self.protocol, &self.client) {
            (Protocol::Oidc, ClientSettings::Oidc(c)) => Ok(c),
            _ => Err(self.mismatch("client")),
        }
    }

    /// OIDC server settings; fails when the entry is not an OIDC federation.
    pub fn oidc_server(&self) -> Result<&OidcServerSettings, ConfigValidationError> {
        match (&self.protocol, &self.server) {
            (Protocol::Oidc, ServerSettings::Oidc(s)) => Ok(s),
            _ => Err(self.mismatch("server")),
        }
    }

    /// SAML2 client (SP) settings; fails when the entry is not a SAML2 federation.
    pub fn saml2_client(&self) -> Result<&Saml2ClientSettings, ConfigValidationError> {
        match (&self.protocol, &self.client) {
            (Protocol::Saml2, ClientSettings::Saml2(c)) => Ok(c),
            _ => Err(self.mismatch("client")),
        }
    }

    /// SAML2 server (IdP) settings; fails when the entry is not a SAML2 federation.
    pub fn saml2_server(&self) -> Result<&Saml2ServerSettings, ConfigValidationError> {
        match (&self.protocol, &self.server) {
            (Protocol::Saml2, ServerSettings::Saml2(s)) => Ok(s),
            _ => Err(self.mismatch("server")),
        }
    }

    fn mismatch(&self, field: &'static str) -> ConfigValidationError {
        ConfigValidationError::ProtocolMismatch {
            id: self.id.clone(),
            protocol: self.protocol.to_string(),
            field,
        }
    }
}
