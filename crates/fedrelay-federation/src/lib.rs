//! Federation subsystem for fedrelay.
//!
//! Delegates end-user authentication to external identity providers over
//! OIDC (authorization code + PKCE) or SAML2 (redirect/POST binding) and
//! normalizes the provider response into a [`models::UserInfo`].
//!
//! The subsystem is organized as:
//!
//! - [`config`] - typed accessor over a federation's static configuration
//! - [`services`] - discovery, metadata caching, authentication-request
//!   building, and callback validation
//! - [`federation`] - the polymorphic federation variants and the registry
//! - [`handlers`] + [`router`] - the HTTP surface (initiation + callback)

pub mod config;
pub mod error;
pub mod federation;
pub mod handlers;
pub mod models;
pub mod router;
pub mod security;
pub mod services;

pub use error::{FederationError, FederationResult};
pub use federation::{Federation, FederationManager, LoginRequest};
pub use router::{federation_router, FederationState};
