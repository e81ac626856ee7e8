//! CLI command implementations.

pub mod fetch;
pub mod migrate;
pub mod shops;

use coa_bridge_core::ShopDomainError;
use coa_bridge_server::config::ConfigError;
use coa_bridge_server::db::RepositoryError;
use coa_bridge_server::shopify::CoaError;
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Server configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Shop argument is not a valid shop domain.
    #[error("Invalid shop: {0}")]
    InvalidShop(#[from] ShopDomainError),

    /// Shop has not installed the app.
    #[error("No session found for shop: {0}")]
    NoSession(String),

    /// COA collection failed.
    #[error("COA error: {0}")]
    Coa(#[from] CoaError),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database URL from `COA_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("COA_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("COA_DATABASE_URL"))
}
