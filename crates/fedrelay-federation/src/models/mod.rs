//! Data models for the federation subsystem.

pub mod claims;
pub mod responses;

pub use claims::UserInfo;
pub use responses::FederationLoginResponse;
