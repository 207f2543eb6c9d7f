//! Typed accessor over a federation's static configuration.
//!
//! [`OidcConfigAccessor`] is the one place that reads an OIDC federation's
//! configuration. Construction fails for non-OIDC entries, so a wrong-protocol
//! accessor is a startup error rather than a latent per-request one.

use fedrelay_core::{FederationEntry, OidcClientSettings, OidcServerSettings, Protocol};
use serde_json::Value;

use crate::error::{FederationError, FederationResult};

/// Path-addressable accessor for an OIDC federation's configuration.
#[derive(Debug, Clone)]
pub struct OidcConfigAccessor {
    entry: FederationEntry,
}

impl OidcConfigAccessor {
    /// Wrap a federation entry. Fails immediately when the entry is not an
    /// OIDC federation; field access later on is then infallible.
    pub fn new(entry: FederationEntry) -> FederationResult<Self> {
        if entry.protocol != Protocol::Oidc {
            return Err(FederationError::InvalidConfiguration(format!(
                "federation '{}' uses protocol '{}', expected 'oidc'",
                entry.id, entry.protocol
            )));
        }
        entry.validate()?;
        Ok(Self { entry })
    }

    /// Dynamic lookup for the supported path shapes: `["id"]`,
    /// `["client", key]`, `["server", key]`.
    ///
    /// Unknown path shapes yield `None` rather than an error. An
    /// `id_token_signed_response_alg` that was configured as an explicit
    /// JSON `null` yields `Some(Value::Null)`, which callers can tell apart
    /// from the absent-field `None`.
    #[must_use]
    pub fn lookup(&self, path: &[&str]) -> Option<Value> {
        match path {
            ["id"] => Some(Value::String(self.entry.id.clone())),
            ["client", key] => {
                let client = self.client();
                match *key {
                    "client_id" => Some(Value::String(client.client_id.clone())),
                    "client_secret" => Some(Value::String(client.client_secret.clone())),
                    "redirect_uri" => Some(Value::String(client.redirect_uri.clone())),
                    "scopes" => Some(Value::Array(
                        client
                            .scopes
                            .iter()
                            .map(|s| Value::String(s.clone()))
                            .collect(),
                    )),
                    "id_token_signed_response_alg" => {
                        client.id_token_signed_response_alg.as_ref().map(|alg| {
                            alg.as_ref()
                                .map_or(Value::Null, |a| Value::String(a.clone()))
                        })
                    }
                    _ => None,
                }
            }
            ["server", key] => {
                let server = self.server();
                match *key {
                    "name" => Some(Value::String(server.name.clone())),
                    "issuer" => Some(Value::String(server.issuer.clone())),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Federation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    /// OIDC client settings. Infallible: the protocol was checked at
    /// construction.
    #[must_use]
    pub fn client(&self) -> &OidcClientSettings {
        match self.entry.oidc_client() {
            Ok(c) => c,
            Err(_) => unreachable!("protocol checked at construction"),
        }
    }

    /// OIDC server settings.
    #[must_use]
    pub fn server(&self) -> &OidcServerSettings {
        match self.entry.oidc_server() {
            Ok(s) => s,
            Err(_) => unreachable!("protocol checked at construction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(alg: Option<&str>) -> FederationEntry {
        let mut client = json!({
            "client_id": "client-abc",
            "client_secret": "s3cret",
            "redirect_uri": "https://rp.example.com/callback/fed-1",
            "scopes": ["openid", "email"]
        });
        if let Some(raw) = alg {
            client["id_token_signed_response_alg"] =
                serde_json::from_str(raw).expect("alg literal");
        }
        serde_json::from_value(json!({
            "id": "fed-1",
            "protocol": "oidc",
            "client": client,
            "server": { "name": "Example IdP", "issuer": "https://idp.example.com" }
        }))
        .unwrap()
    }

    fn saml2_entry() -> FederationEntry {
        serde_json::from_value(json!({
            "id": "corp-sso",
            "protocol": "saml2",
            "client": {
                "sp_entity_id": "https://rp.example.com/saml",
                "acs_url": "https://rp.example.com/callback/corp-sso"
            },
            "server": {
                "name": "Corp IdP",
                "idp_entity_id": "https://idp.corp.example.com",
                "sso_url": "https://idp.corp.example.com/sso",
                "certificate": "MIIC..."
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_supported_paths_return_configured_values() {
        let accessor = OidcConfigAccessor::new(entry(None)).unwrap();
        assert_eq!(accessor.lookup(&["id"]), Some(json!("fed-1")));
        assert_eq!(
            accessor.lookup(&["client", "client_id"]),
            Some(json!("client-abc"))
        );
        assert_eq!(
            accessor.lookup(&["client", "redirect_uri"]),
            Some(json!("https://rp.example.com/callback/fed-1"))
        );
        assert_eq!(
            accessor.lookup(&["client", "scopes"]),
            Some(json!(["openid", "email"]))
        );
        assert_eq!(
            accessor.lookup(&["server", "issuer"]),
            Some(json!("https://idp.example.com"))
        );
        assert_eq!(
            accessor.lookup(&["server", "name"]),
            Some(json!("Example IdP"))
        );
    }

    #[test]
    fn test_unknown_paths_return_none_never_panic() {
        let accessor = OidcConfigAccessor::new(entry(None)).unwrap();
        assert_eq!(accessor.lookup(&[]), None);
        assert_eq!(accessor.lookup(&["nope"]), None);
        assert_eq!(accessor.lookup(&["client", "nope"]), None);
        assert_eq!(accessor.lookup(&["server", "nope"]), None);
        assert_eq!(accessor.lookup(&["client", "client_id", "extra"]), None);
    }

    #[test]
    fn test_wrong_protocol_fails_at_construction() {
        let err = OidcConfigAccessor::new(saml2_entry()).unwrap_err();
        assert!(matches!(err, FederationError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_alg_explicit_null_vs_absent() {
        // Explicit null: present, null-valued
        let accessor = OidcConfigAccessor::new(entry(Some("null"))).unwrap();
        assert_eq!(
            accessor.lookup(&["client", "id_token_signed_response_alg"]),
            Some(Value::Null)
        );

        // Configured value passes through
        let accessor = OidcConfigAccessor::new(entry(Some("\"RS256\""))).unwrap();
        assert_eq!(
            accessor.lookup(&["client", "id_token_signed_response_alg"]),
            Some(json!("RS256"))
        );

        // Absent: indistinguishable from an unknown path
        let accessor = OidcConfigAccessor::new(entry(None)).unwrap();
        assert_eq!(
            accessor.lookup(&["client", "id_token_signed_response_alg"]),
            None
        );
    }
}
