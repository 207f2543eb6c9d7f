//! fedrelay Core Library
//!
//! Shared types for fedrelay.
//!
//! # Modules
//!
//! - [`config`] - Static federation configuration model (`FederationEntry`)
//! - [`session`] - Session store capability (`SessionStore`) with an in-memory implementation

pub mod config;
pub mod session;

// Re-export main types for convenient access
pub use config::{
    ClientSettings, ConfigValidationError, FederationEntry, OidcClientSettings,
    OidcServerSettings, Protocol, Saml2Binding, Saml2ClientSettings, Saml2ServerSettings,
    ServerSettings,
};
pub use session::{InMemorySessionStore, SessionError, SessionStore, SharedSessionStore};
