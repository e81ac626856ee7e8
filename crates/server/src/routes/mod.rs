//! HTTP route handlers for COA Bridge.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # App install (Shopify OAuth)
//! GET  /auth?shop=             - Redirect to the shop's consent page
//! GET  /auth/callback          - Verify, exchange code, store token
//!
//! # API
//! GET  /api/coas?shop=         - COA list for a shop, newest first (JSON)
//! ```

pub mod coa;
pub mod health;
pub mod shopify_auth;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create the app install routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", get(shopify_auth::begin))
        .route("/auth/callback", get(shopify_auth::callback))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/api/coas", get(coa::list))
}

/// Create the health check routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}

#[cfg(test)]
pub mod test_support {
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    use crate::config::{CoaConfig, ServerConfig, ShopifyAppConfig};
    use crate::state::AppState;

    /// State backed by a pool that never connects unless a query runs.
    #[allow(clippy::unwrap_used)]
    pub fn test_state(api_secret: &str) -> AppState {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/coa_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            base_url: "https://coa.example.org".to_string(),
            shopify: ShopifyAppConfig {
                api_key: "key123".to_string(),
                api_secret: SecretString::from(api_secret),
                api_version: "2025-01".to_string(),
                scopes: vec!["read_metaobjects".to_string()],
            },
            coa: CoaConfig::default(),
            cors_origins: vec![],
            sentry_dsn: None,
            sentry_environment: None,
        };

        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/coa_test")
            .unwrap();

        AppState::new(config, pool)
    }
}
