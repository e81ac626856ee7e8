//! Session middleware configuration.
//!
//! Sessions only carry the OAuth `state` between `/auth` and
//! `/auth/callback`, so they are short-lived.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ServerConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "coa_session";

/// Session expiry time in seconds (10 minutes).
const SESSION_EXPIRY_SECONDS: i64 = 10 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The cookie is `SameSite=Lax` because the OAuth callback arrives as a
/// top-level cross-site redirect from the shop admin.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &ServerConfig,
) -> SessionManagerLayer<PostgresStore> {
    // Note: The session table must be created via migration
    let store = PostgresStore::new(pool.clone());

    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
