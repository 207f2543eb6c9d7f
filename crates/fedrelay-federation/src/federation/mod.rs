//! Polymorphic federation variants and the registry.

pub mod manager;
pub mod oidc;
pub mod saml2;

pub use manager::FederationManager;
pub use oidc::OidcFederation;
pub use saml2::Saml2Federation;

use fedrelay_core::Protocol;

/// A configured external identity provider, ready to serve logins.
///
/// Closed over the two supported protocols; the initiation and callback
/// handlers are the only dispatch sites.
pub enum Federation {
    Oidc(OidcFederation),
    Saml2(Saml2Federation),
}

impl Federation {
    /// Federation id used in routes and subject qualification.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Oidc(f) => f.id(),
            Self::Saml2(f) => f.id(),
        }
    }

    #[must_use]
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Oidc(_) => Protocol::Oidc,
            Self::Saml2(_) => Protocol::Saml2,
        }
    }
}

/// How the user agent is sent to the IdP at initiation time.
///
/// The variant is decided by the federation's configuration (OIDC always
/// redirects; SAML2 follows the configured binding), never by caller input.
#[derive(Debug, Clone)]
pub enum LoginRequest {
    Redirect { location: String },
    Post { html: String },
}
