//! Shopify Admin API credential types.
//!
//! A credential is the `(shop, access token)` pair handed to the COA
//! collector by the session store.

use secrecy::{ExposeSecret, SecretString};

use super::shop::ShopDomain;

/// Offline Admin API access token.
///
/// Wraps a `SecretString` so the token never shows up in `Debug` output
/// or tracing fields.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Create a new access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for use in a request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns `true` if the token is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl From<SecretString> for AccessToken {
    fn from(token: SecretString) -> Self {
        Self(token)
    }
}

/// Credential for one shop: the target domain plus its access token.
#[derive(Debug, Clone)]
pub struct ShopCredential {
    /// Shop the token was issued for.
    pub shop: ShopDomain,
    /// Admin API access token.
    pub access_token: AccessToken,
}

impl ShopCredential {
    /// Create a new credential.
    #[must_use]
    pub const fn new(shop: ShopDomain, access_token: AccessToken) -> Self {
        Self { shop, access_token }
    }
}
