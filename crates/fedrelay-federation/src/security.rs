//! Security-parameter generation.
//!
//! State and PKCE verifier values come from the OIDC client library's
//! secure-random primitives; nothing here is hand-rolled. Handlers go
//! through this module so tests can construct deterministic bindings by
//! writing to the session store directly.

use openidconnect::{CsrfToken, PkceCodeChallenge};

/// Generate an opaque per-request state value.
#[must_use]
pub fn generate_state() -> String {
    CsrfToken::new_random().secret().clone()
}

/// Generate a PKCE code verifier.
#[must_use]
pub fn generate_code_verifier() -> String {
    let (_, verifier) = PkceCodeChallenge::new_random_sha256();
    verifier.secret().clone()
}
