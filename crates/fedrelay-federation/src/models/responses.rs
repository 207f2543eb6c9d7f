//! Response models for the federation HTTP surface.

use serde::Serialize;

/// Body returned by a successful federation callback.
#[derive(Debug, Clone, Serialize)]
pub struct FederationLoginResponse {
    /// Federation-qualified local subject (`<providerSubject>@<federationId>`).
    pub subject: String,
    pub federation_id: String,
}
