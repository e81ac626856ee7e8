//! Installed-shop session repository.
//!
//! One row per shop that completed the OAuth install, holding its offline
//! Admin API access token.

use chrono::{DateTime, Utc};
use coa_bridge_core::{AccessToken, ShopCredential, ShopDomain};
use sqlx::PgPool;

use super::RepositoryError;
use crate::shopify::OAuthToken;

// =============================================================================
// Types
// =============================================================================

/// A stored shop session.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopSession {
    /// Shop domain (e.g., oil-co.myshopify.com).
    pub shop: ShopDomain,
    /// Offline access token (redacted in debug output).
    pub access_token: AccessToken,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Unix timestamp when the token was obtained.
    pub obtained_at: i64,
    /// When the shop first installed the app.
    pub created_at: DateTime<Utc>,
    /// When the token was last replaced.
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("obtained_at", &self.obtained_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl ShopSession {
    /// The credential used for Admin API calls.
    #[must_use]
    pub fn credential(&self) -> ShopCredential {
        ShopCredential::new(self.shop.clone(), self.access_token.clone())
    }
}

/// Internal row type for `PostgreSQL` queries.
#[derive(sqlx::FromRow)]
struct ShopSessionRow {
    shop: String,
    access_token: String,
    scope: String,
    obtained_at: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShopSessionRow> for ShopSession {
    type Error = RepositoryError;

    fn try_from(row: ShopSessionRow) -> Result<Self, Self::Error> {
        let shop = ShopDomain::parse(&row.shop)
            .map_err(|e| RepositoryError::DataCorruption(format!("shop {:?}: {e}", row.shop)))?;

        Ok(Self {
            shop,
            access_token: AccessToken::new(row.access_token),
            scopes: split_scope(&row.scope),
            obtained_at: row.obtained_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn split_scope(scope: &str) -> Vec<String> {
    scope
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shop session database operations.
pub struct ShopSessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopSessionRepository<'a> {
    /// Create a new shop session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored shop is invalid.
    pub async fn get_by_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<ShopSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopSessionRow>(
            r"
            SELECT shop, access_token, scope, obtained_at, created_at, updated_at
            FROM shop_sessions
            WHERE shop = $1
            ",
        )
        .bind(shop.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(ShopSession::try_from).transpose()
    }

    /// Look up the Admin API credential for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn find_credential(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<ShopCredential>, RepositoryError> {
        Ok(self
            .get_by_shop(shop)
            .await?
            .map(|session| session.credential()))
    }

    /// Save or replace the token for a shop.
    ///
    /// Reinstalling a shop overwrites its previous token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(&self, token: &OAuthToken) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop_sessions (shop, access_token, scope, obtained_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(shop) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                obtained_at = EXCLUDED.obtained_at,
                updated_at = NOW()
            ",
        )
        .bind(token.shop.as_str())
        .bind(token.access_token.expose())
        .bind(&token.scope)
        .bind(token.obtained_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete the session for a shop.
    ///
    /// Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop_sessions WHERE shop = $1")
            .bind(shop.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(shop: &str) -> ShopSessionRow {
        ShopSessionRow {
            shop: shop.to_string(),
            access_token: "shpat_0123456789".to_string(),
            scope: "read_metaobjects, read_products,".to_string(),
            obtained_at: 1_717_200_000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let session = ShopSession::try_from(row("oil-co.myshopify.com")).unwrap();
        assert_eq!(session.shop.as_str(), "oil-co.myshopify.com");
        assert_eq!(session.scopes, ["read_metaobjects", "read_products"]);

        let credential = session.credential();
        assert_eq!(credential.access_token.expose(), "shpat_0123456789");
    }

    #[test]
    fn test_row_with_invalid_shop_is_corruption() {
        let result = ShopSession::try_from(row("not-a-shop.example.com"));
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = ShopSession::try_from(row("oil-co.myshopify.com")).unwrap();
        let debug_output = format!("{session:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpat_0123456789"));
    }
}
