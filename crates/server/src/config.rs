//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `COA_BASE_URL` - Public URL of this app (used for the OAuth redirect URI)
//! - `SHOPIFY_API_KEY` - App API key (OAuth client ID)
//! - `SHOPIFY_API_SECRET` - App API secret (OAuth client secret, HMAC key)
//!
//! ## Optional
//! - `COA_HOST` - Bind address (default: 127.0.0.1)
//! - `COA_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2025-01)
//! - `SHOPIFY_SCOPES` - Comma-separated OAuth scopes
//! - `COA_MAX_PAGES` - Page ceiling per COA collection (default: 100)
//! - `COA_REQUEST_TIMEOUT_SECS` - Deadline for one COA collection (default: 30)
//! - `COA_CORS_ORIGINS` - Comma-separated storefront origins allowed to call the API
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_SCOPES: &str = "read_metaobjects,read_products,read_files";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this app, without trailing slash
    pub base_url: String,
    /// Shopify app configuration
    pub shopify: ShopifyAppConfig,
    /// COA collection limits
    pub coa: CoaConfig,
    /// Origins allowed to call `/api/*` cross-origin
    pub cors_origins: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Shopify app credentials and API settings.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyAppConfig {
    /// App API key (OAuth client ID)
    pub api_key: String,
    /// App API secret (OAuth client secret, HMAC key)
    pub api_secret: SecretString,
    /// Admin API version (e.g., 2025-01)
    pub api_version: String,
    /// OAuth scopes requested at install
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ShopifyAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAppConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Limits applied to each COA collection.
#[derive(Debug, Clone)]
pub struct CoaConfig {
    /// Maximum pages fetched before giving up
    pub max_pages: usize,
    /// Overall deadline for one collection
    pub request_timeout: Duration,
}

impl Default for CoaConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("COA_DATABASE_URL")?;
        let host = parse_env("COA_HOST", "127.0.0.1")?;
        let port = parse_env("COA_PORT", "3000")?;
        let base_url = get_base_url("COA_BASE_URL")?;

        let shopify = ShopifyAppConfig::from_env()?;
        let coa = CoaConfig::from_env()?;
        let cors_origins = get_origins("COA_CORS_ORIGINS")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            shopify,
            coa,
            cors_origins,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// OAuth redirect URI registered with Shopify.
    #[must_use]
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.base_url)
    }
}

impl ShopifyAppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_required_env("SHOPIFY_API_KEY")?,
            api_secret: get_validated_secret("SHOPIFY_API_SECRET")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2025-01"),
            scopes: split_list(&get_env_or_default("SHOPIFY_SCOPES", DEFAULT_SCOPES)),
        })
    }
}

impl CoaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_pages: usize = parse_env("COA_MAX_PAGES", "100")?;
        if max_pages == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "COA_MAX_PAGES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let timeout_secs: u64 = parse_env("COA_REQUEST_TIMEOUT_SECS", "30")?;

        Ok(Self {
            max_pages,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get the public base URL, validated and without trailing slash.
fn get_base_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    validate_base_url(&value)
        .map_err(|reason| ConfigError::InvalidEnvVar(key.to_string(), reason))
}

fn validate_base_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("must be an http(s) URL".to_string());
    }
    if url.host_str().is_none() {
        return Err("must have a host".to_string());
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Parse a comma-separated list of origins, each a valid http(s) URL.
fn get_origins(key: &str) -> Result<Vec<String>, ConfigError> {
    split_list(&get_env_or_default(key, ""))
        .into_iter()
        .map(|origin| {
            validate_base_url(&origin).map_err(|reason| {
                ConfigError::InvalidEnvVar(key.to_string(), format!("{origin}: {reason}"))
            })
        })
        .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret from the Shopify Partner dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
