//! Integration tests for COA Bridge.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! cargo run -p coa-bridge-cli -- migrate
//!
//! # Start the server in another terminal
//! cargo run -p coa-bridge-server
//!
//! # Run integration tests
//! cargo test -p coa-bridge-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `server_http` - HTTP surface of a running server
//! - `shop_sessions` - Repository against a real database
//! - `live_shop` - COA collection against a real installed shop

use secrecy::SecretString;

/// Base URL of the running server (configurable via environment).
#[must_use]
pub fn server_base_url() -> String {
    std::env::var("COA_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Database URL for repository tests.
///
/// # Panics
///
/// Panics if neither `COA_DATABASE_URL` nor `DATABASE_URL` is set.
#[must_use]
#[allow(clippy::expect_used)]
pub fn database_url() -> SecretString {
    std::env::var("COA_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .expect("COA_DATABASE_URL must be set for integration tests")
}

/// A shop domain no test run has used before.
#[must_use]
pub fn unique_shop() -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(12)
        .collect();
    format!("it-{suffix}.myshopify.com")
}
