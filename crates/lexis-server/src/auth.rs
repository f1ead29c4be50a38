// crates/lexis-server/src/auth.rs
// ============================================================================
// Module: Lexis Authentication
// Description: Identity provider seam and static bearer-token provider.
// Purpose: Turn request credentials into a per-request identity.
// Dependencies: async-trait, axum, lexis-config, lexis-core, sha2, subtle
// ============================================================================

//! ## Overview
//! Credential issuance lives outside this crate. The server only asks an
//! [`IdentityProvider`] to turn request headers into an [`AuthContext`].
//! [`StaticTokenIdentityProvider`] maps configured bearer tokens to fixed
//! identities and compares tokens in constant time.
//!
//! ## Invariants
//! - Raw tokens never leave this module; callers see a SHA-256 fingerprint.
//! - Every failure is [`AuthError::Unauthenticated`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use lexis_config::AuthConfig;
use lexis_core::Identity;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header size in bytes.
pub const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

/// Authenticated caller for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Caller identity used for authorization.
    pub identity: Identity,
    /// SHA-256 fingerprint of the presented token, hex encoded.
    pub token_fingerprint: Option<String>,
}

/// Authentication collaborator interface.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticates a request from its headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when credentials are missing
    /// or not recognized.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError>;
}

// ============================================================================
// SECTION: Static Token Provider
// ============================================================================

/// Identity provider backed by configured bearer tokens.
pub struct StaticTokenIdentityProvider {
    /// Token and identity pairs.
    principals: Vec<(String, Identity)>,
}

impl StaticTokenIdentityProvider {
    /// Creates a provider from token and identity pairs.
    #[must_use]
    pub fn new(principals: impl IntoIterator<Item = (String, Identity)>) -> Self {
        Self {
            principals: principals.into_iter().collect(),
        }
    }

    /// Creates a provider from the `[auth]` config section.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.principals.iter().map(|principal| (principal.token.clone(), principal.identity())),
        )
    }

    /// Number of configured principals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// Returns true when no principals are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    /// Finds the identity for a token, scanning every entry.
    fn lookup(&self, token: &str) -> Option<&Identity> {
        let mut found = None;
        for (candidate, identity) in &self.principals {
            if bool::from(candidate.as_bytes().ct_eq(token.as_bytes())) && found.is_none() {
                found = Some(identity);
            }
        }
        found
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentityProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let token = bearer_token(headers)?;
        let identity = self
            .lookup(token)
            .ok_or_else(|| AuthError::Unauthenticated("unknown bearer token".to_string()))?;
        Ok(AuthContext {
            identity: identity.clone(),
            token_fingerprint: Some(token_fingerprint(token)),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the credential of the `Authorization: Bearer <token>` header.
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] when the header is absent, larger
/// than [`MAX_AUTH_HEADER_BYTES`], not visible ASCII, or uses another scheme.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let unauthenticated = |reason: &str| AuthError::Unauthenticated(reason.to_string());
    let value = headers.get(AUTHORIZATION).ok_or_else(|| unauthenticated("missing authorization"))?;
    if value.len() > MAX_AUTH_HEADER_BYTES {
        return Err(unauthenticated("authorization header too large"));
    }
    let value = value.to_str().map_err(|_| unauthenticated("authorization header is not ascii"))?;
    let (scheme, token) = value.trim().split_once(char::is_whitespace).unwrap_or_default();
    let token = token.trim_start();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(unauthenticated("invalid authorization header"));
    }
    Ok(token)
}

/// Returns the hex-encoded SHA-256 fingerprint of a token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use super::*;

    use axum::http::HeaderValue;

    fn authorization(value: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(value).unwrap());
        headers
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&authorization(b"bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&authorization(b"BEARER \t abc  ")).unwrap(), "abc");
    }

    #[test]
    fn bearer_parsing_rejects_bad_headers() {
        assert!(bearer_token(&HeaderMap::new()).is_err());
        assert!(bearer_token(&authorization(b"Basic abc")).is_err());
        assert!(bearer_token(&authorization(b"Bearer")).is_err());
        assert_eq!(
            bearer_token(&authorization(b"Bearer caf\xc3\xa9")),
            Err(AuthError::Unauthenticated("authorization header is not ascii".to_string()))
        );
        let oversized = format!("Bearer {}", "a".repeat(MAX_AUTH_HEADER_BYTES));
        assert_eq!(
            bearer_token(&authorization(oversized.as_bytes())),
            Err(AuthError::Unauthenticated("authorization header too large".to_string()))
        );
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        assert_eq!(
            token_fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
