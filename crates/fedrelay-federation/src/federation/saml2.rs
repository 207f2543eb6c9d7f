//! SAML2 federation: SP-initiated SSO against an external IdP.
//!
//! AuthnRequest construction and response/assertion validation (signature,
//! audience, timing, InResponseTo) are delegated to the SAML2 toolkit; this
//! module owns binding selection, the relay-state contract, and claim
//! normalization.

use base64::Engine;
use fedrelay_core::{FederationEntry, Protocol, Saml2Binding, Saml2ClientSettings, Saml2ServerSettings};
use samael::metadata::EntityDescriptor;
use samael::service_provider::{ServiceProvider, ServiceProviderBuilder};
use tracing::instrument;

use crate::error::{FederationError, FederationResult};
use crate::federation::LoginRequest;
use crate::models::UserInfo;

/// One configured SAML2 federation.
#[derive(Clone)]
pub struct Saml2Federation {
    id: String,
    client: Saml2ClientSettings,
    server: Saml2ServerSettings,
}

impl Saml2Federation {
    /// Build from a federation entry. Fails at construction on a non-SAML2
    /// entry, missing required fields, or unparseable IdP metadata.
    pub fn new(entry: FederationEntry) -> FederationResult<Self> {
        if entry.protocol != Protocol::Saml2 {
            return Err(FederationError::InvalidConfiguration(format!(
                "federation '{}' uses protocol '{}', expected 'saml2'",
                entry.id, entry.protocol
            )));
        }
        entry.validate()?;

        let federation = Self {
            id: entry.id.clone(),
            client: entry.saml2_client()?.clone(),
            server: entry.saml2_server()?.clone(),
        };

        // Misconfiguration (bad certificate, malformed entity id) must
        // surface at registry construction, not on the first login
        federation.build_idp_metadata()?;

        Ok(federation)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Build the login request toward the IdP.
    ///
    /// Returns the request and the generated AuthnRequest id; the caller
    /// binds the id to its session for InResponseTo verification at the
    /// callback. The redirect/POST choice follows the configured binding.
    #[instrument(skip(self), fields(federation_id = %self.id))]
    pub fn process_login_request(
        &self,
        relay_state: &str,
    ) -> FederationResult<(LoginRequest, String)> {
        let sp = self.service_provider()?;

        let authn_request = sp
            .make_authentication_request(&self.server.sso_url)
            .map_err(|e| {
                FederationError::Internal(format!("Failed to create AuthnRequest: {e}"))
            })?;
        let request_id = authn_request.id.clone();

        let login = match self.server.binding {
            Saml2Binding::Redirect => {
                let url = authn_request
                    .redirect(relay_state)
                    .map_err(|e| {
                        FederationError::Internal(format!("Failed to encode AuthnRequest: {e}"))
                    })?
                    .ok_or_else(|| {
                        FederationError::Internal("AuthnRequest has no destination".to_string())
                    })?;
                LoginRequest::Redirect {
                    location: url.to_string(),
                }
            }
            Saml2Binding::Post => {
                use samael::traits::ToXml;
                let xml = authn_request.to_string().map_err(|e| {
                    FederationError::Internal(format!("Failed to serialize AuthnRequest: {e:?}"))
                })?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(xml.as_bytes());
                LoginRequest::Post {
                    html: auto_submit_form(&self.server.sso_url, &encoded, relay_state),
                }
            }
        };

        tracing::info!(
            federation_id = %self.id,
            binding = ?self.server.binding,
            request_id = %request_id,
            "SAML2 login request created"
        );

        Ok((login, request_id))
    }

    /// Validate a base64-encoded SAML response and extract the user identity.
    #[instrument(skip_all, fields(federation_id = %self.id))]
    pub fn process_saml2_response(
        &self,
        saml_response_b64: &str,
        expected_request_id: Option<&str>,
    ) -> FederationResult<UserInfo> {
        let sp = self.service_provider()?;

        let possible_request_ids: Vec<&str> = expected_request_id.into_iter().collect();
        let assertion = sp
            .parse_base64_response(saml_response_b64, Some(&possible_request_ids))
            .map_err(|e| FederationError::Saml2ResponseInvalid(e.to_string()))?;

        let name_id = assertion
            .subject
            .as_ref()
            .and_then(|s| s.name_id.as_ref())
            .map(|n| n.value.clone())
            .ok_or_else(|| {
                FederationError::Saml2ResponseInvalid("Assertion missing NameID".to_string())
            })?;

        let mut user = UserInfo::with_subject(name_id);

        // Preserve every asserted attribute; single-valued attributes
        // flatten to a plain string
        if let Some(statements) = assertion.attribute_statements.as_ref() {
            for statement in statements {
                for attr in &statement.attributes {
                    let Some(key) = attr.name.clone().or_else(|| attr.friendly_name.clone())
                    else {
                        continue;
                    };
                    let mut values: Vec<serde_json::Value> = attr
                        .values
                        .iter()
                        .filter_map(|v| v.value.clone())
                        .map(serde_json::Value::String)
                        .collect();
                    let value = if values.len() == 1 {
                        values.remove(0)
                    } else {
                        serde_json::Value::Array(values)
                    };
                    user.additional.insert(key, value);
                }
            }
        }

        if let Some(serde_json::Value::String(email)) = user.additional.get("email") {
            user.email = Some(email.clone());
        }

        tracing::info!(
            federation_id = %self.id,
            subject = %user.subject,
            "SAML2 response validated"
        );

        Ok(user)
    }

    /// Build the toolkit service provider for this federation.
    fn service_provider(&self) -> FederationResult<ServiceProvider> {
        ServiceProviderBuilder::default()
            .entity_id(self.client.sp_entity_id.clone())
            .acs_url(self.client.acs_url.clone())
            .idp_metadata(self.build_idp_metadata()?)
            .authn_name_id_format(self.client.name_id_format.clone().unwrap_or_default())
            .build()
            .map_err(|e| {
                FederationError::Internal(format!("Failed to build ServiceProvider: {e}"))
            })
    }

    /// Build a minimal IdP EntityDescriptor from the configured endpoint and
    /// certificate.
    fn build_idp_metadata(&self) -> FederationResult<EntityDescriptor> {
        let xml = format!(
            r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{}">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                <ds:X509Data>
                    <ds:X509Certificate>{}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>
        <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{}"/>
        <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{}"/>
    </md:IDPSSODescriptor>
</md:EntityDescriptor>"#,
            self.server.idp_entity_id,
            strip_pem_headers(&self.server.certificate),
            self.server.sso_url,
            self.server.sso_url,
        );

        samael::metadata::de::from_str(&xml).map_err(|e| {
            FederationError::InvalidConfiguration(format!("Failed to build IdP metadata: {e}"))
        })
    }
}

/// Strip PEM armor lines from a certificate so only the base64 body remains.
fn strip_pem_headers(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----BEGIN") && !line.starts_with("-----END"))
        .collect::<Vec<_>>()
        .join("")
}

/// Auto-submit POST-binding form carrying the AuthnRequest.
fn auto_submit_form(sso_url: &str, saml_request: &str, relay_state: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>SAML SSO</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="POST" action="{}">
        <input type="hidden" name="SAMLRequest" value="{}"/>
        <input type="hidden" name="RelayState" value="{}"/>
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
        html_escape(sso_url),
        html_escape(saml_request),
        html_escape(relay_state)
    )
}

/// HTML escape for XSS prevention.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
