//! Shopify shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input is not a `*.myshopify.com` host.
    #[error("shop domain must end with {suffix}")]
    WrongSuffix {
        /// Required suffix.
        suffix: &'static str,
    },
    /// The store name contains characters Shopify never issues.
    #[error("invalid shop name: {0}")]
    InvalidName(String),
}

/// A Shopify shop domain, e.g. `my-store.myshopify.com`.
///
/// Shop domains arrive as untrusted query parameters during OAuth, and they
/// are interpolated into upstream URLs, so only permanent `myshopify.com`
/// hosts are accepted.
///
/// ## Constraints
///
/// - Length: 1-255 characters
/// - Lowercased, surrounding whitespace trimmed
/// - Must end with `.myshopify.com`
/// - Store name: ASCII letters, digits and `-`, starting with a letter or digit
///
/// ## Examples
///
/// ```
/// use coa_bridge_core::ShopDomain;
///
/// assert!(ShopDomain::parse("my-store.myshopify.com").is_ok());
/// assert!(ShopDomain::parse("MY-STORE.myshopify.com").is_ok());
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("evil.com").is_err());
/// assert!(ShopDomain::parse("a/b.myshopify.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Maximum length of a shop domain (DNS host name limit).
    pub const MAX_LENGTH: usize = 255;

    /// Suffix every permanent shop domain carries.
    pub const SUFFIX: &'static str = ".myshopify.com";

    /// Parse a `ShopDomain` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Is longer than 255 characters
    /// - Does not end with `.myshopify.com`
    /// - Has a store name with characters outside `[a-z0-9-]`
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let normalized = s.trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if normalized.len() > Self::MAX_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let name = normalized
            .strip_suffix(Self::SUFFIX)
            .ok_or(ShopDomainError::WrongSuffix {
                suffix: Self::SUFFIX,
            })?;

        let valid_name = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !valid_name {
            return Err(ShopDomainError::InvalidName(name.to_owned()));
        }

        Ok(Self(normalized))
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the store name (the part before `.myshopify.com`).
    #[must_use]
    pub fn store_name(&self) -> &str {
        self.0.strip_suffix(Self::SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ShopDomain> for String {
    fn from(shop: ShopDomain) -> Self {
        shop.0
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ShopDomain {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShopDomain {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Only validated domains are ever written
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ShopDomain {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_domains() {
        assert!(ShopDomain::parse("store.myshopify.com").is_ok());
        assert!(ShopDomain::parse("my-store-2.myshopify.com").is_ok());
        assert!(ShopDomain::parse("0store.myshopify.com").is_ok());
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let shop = ShopDomain::parse("  My-Store.MyShopify.com ").unwrap();
        assert_eq!(shop.as_str(), "my-store.myshopify.com");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ShopDomain::parse("   "), Err(ShopDomainError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}.myshopify.com", "a".repeat(250));
        assert!(matches!(
            ShopDomain::parse(&long),
            Err(ShopDomainError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_wrong_suffix() {
        assert!(matches!(
            ShopDomain::parse("store.example.com"),
            Err(ShopDomainError::WrongSuffix { .. })
        ));
        assert!(matches!(
            ShopDomain::parse("store.myshopify.com.evil.com"),
            Err(ShopDomainError::WrongSuffix { .. })
        ));
    }

    #[test]
    fn test_parse_invalid_name() {
        assert!(matches!(
            ShopDomain::parse(".myshopify.com"),
            Err(ShopDomainError::InvalidName(_))
        ));
        assert!(matches!(
            ShopDomain::parse("-store.myshopify.com"),
            Err(ShopDomainError::InvalidName(_))
        ));
        assert!(matches!(
            ShopDomain::parse("evil.com/x.myshopify.com"),
            Err(ShopDomainError::InvalidName(_))
        ));
        assert!(matches!(
            ShopDomain::parse("sub.store.myshopify.com"),
            Err(ShopDomainError::InvalidName(_))
        ));
    }

    #[test]
    fn test_store_name() {
        let shop = ShopDomain::parse("oil-co.myshopify.com").unwrap();
        assert_eq!(shop.store_name(), "oil-co");
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let shop: ShopDomain = serde_json::from_str("\"oil-co.myshopify.com\"").unwrap();
        assert_eq!(serde_json::to_string(&shop).unwrap(), "\"oil-co.myshopify.com\"");

        assert!(serde_json::from_str::<ShopDomain>("\"oil-co.example.com\"").is_err());
    }
}
