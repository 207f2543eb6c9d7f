//! Federation registry.

use std::collections::HashMap;

use fedrelay_core::{FederationEntry, Protocol};

use crate::error::{FederationError, FederationResult};
use crate::federation::{Federation, OidcFederation, Saml2Federation};

/// Registry of configured federations, keyed by federation id.
///
/// Construction is eager: every entry is validated and wired (OIDC
/// federations get their metadata providers, SAML2 federations parse their
/// IdP descriptors) at startup, so misconfiguration never waits for the
/// first login to surface.
pub struct FederationManager {
    federations: HashMap<String, Federation>,
}

impl FederationManager {
    /// Build every configured federation.
    pub fn from_entries(entries: Vec<FederationEntry>) -> FederationResult<Self> {
        let mut federations = HashMap::new();
        for entry in entries {
            let id = entry.id.clone();
            if federations.contains_key(&id) {
                return Err(FederationError::InvalidConfiguration(format!(
                    "duplicate federation id: {id}"
                )));
            }
            let federation = match entry.protocol {
                Protocol::Oidc => Federation::Oidc(OidcFederation::new(entry)?),
                Protocol::Saml2 => Federation::Saml2(Saml2Federation::new(entry)?),
            };
            federations.insert(id, federation);
        }
        tracing::info!(count = federations.len(), "Federation registry built");
        Ok(Self { federations })
    }

    /// Look up a federation by id. Unknown ids fail; callers map the error
    /// to their 404-equivalent.
    pub fn get(&self, id: &str) -> FederationResult<&Federation> {
        self.federations
            .get(id)
            .ok_or_else(|| FederationError::FederationNotFound(id.to_string()))
    }

    /// Registered federation ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.federations.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.federations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.federations.is_empty()
    }
}
