//! Normalized user identity returned by a federation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider-returned identity claims, normalized across protocols.
///
/// `subject` carries the OIDC `sub` or the SAML2 `NameID`. Everything the
/// provider sent beyond the well-known fields is preserved in `additional`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl UserInfo {
    /// Minimal identity with just a provider subject.
    #[must_use]
    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            email_verified: None,
            name: None,
            given_name: None,
            family_name: None,
            picture: None,
            additional: HashMap::new(),
        }
    }

    /// Compose the federation-qualified subject.
    ///
    /// Subjects from different federations must never collide even when the
    /// raw provider identifiers do, so the local subject is always
    /// `<providerSubject>@<federationId>`.
    #[must_use]
    pub fn qualified_subject(&self, federation_id: &str) -> String {
        format!("{}@{}", self.subject, federation_id)
    }
}
