//! Shopify Admin API GraphQL client with OAuth authentication.
//!
//! One client serves every installed shop: the shop and its access token
//! travel with each call as a [`ShopCredential`].

use std::sync::Arc;

use coa_bridge_core::{AccessToken, ShopCredential, ShopDomain};
use graphql_client::{GraphQLQuery, Response};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::config::ShopifyAppConfig;

use super::{GraphQLError, GraphQLErrorLocation, ShopifyError};

/// Maximum number of response body characters kept in errors and logs.
const BODY_SNIPPET_CHARS: usize = 200;

/// OAuth token for Admin API access.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    /// Associated shop domain
    pub shop: ShopDomain,
    /// The offline access token for API calls
    pub access_token: AccessToken,
    /// Granted scopes (comma-separated)
    pub scope: String,
    /// Unix timestamp when token was obtained
    pub obtained_at: i64,
}

/// Shopify Admin API GraphQL client.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    api_key: String,
    api_secret: SecretString,
    api_version: String,
    scopes: Vec<String>,
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    scope: String,
}

impl AdminClient {
    /// Create a new Admin API client.
    #[must_use]
    pub fn new(config: &ShopifyAppConfig) -> Self {
        Self {
            inner: Arc::new(AdminClientInner {
                client: reqwest::Client::new(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                api_version: config.api_version.clone(),
                scopes: config.scopes.clone(),
            }),
        }
    }

    /// Get the app's API key (OAuth client ID).
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    /// Get the app's API secret (for HMAC verification).
    #[must_use]
    pub fn api_secret(&self) -> &str {
        self.inner.api_secret.expose_secret()
    }

    /// GraphQL endpoint for a shop.
    #[must_use]
    pub fn graphql_endpoint(&self, shop: &ShopDomain) -> String {
        format!(
            "https://{shop}/admin/api/{}/graphql.json",
            self.inner.api_version
        )
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL.
    ///
    /// Redirect the merchant to this URL to begin the install flow.
    #[must_use]
    pub fn authorization_url(&self, shop: &ShopDomain, redirect_uri: &str, state: &str) -> String {
        let scope = self.inner.scopes.join(",");
        format!(
            "https://{shop}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            urlencoding::encode(&self.inner.api_key),
            urlencoding::encode(&scope),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if Shopify rejects the exchange.
    /// Returns `ShopifyError::Http` if the HTTP request fails.
    #[instrument(skip(self, code), fields(shop = %shop))]
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<OAuthToken, ShopifyError> {
        let url = format!("https://{shop}/admin/oauth/access_token");

        let params = [
            ("client_id", self.inner.api_key.as_str()),
            ("client_secret", self.inner.api_secret.expose_secret()),
            ("code", code),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed: {}",
                snippet(&text)
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await?;

        Ok(OAuthToken {
            shop: shop.clone(),
            access_token: AccessToken::new(token_response.access_token),
            scope: token_response.scope,
            obtained_at: chrono::Utc::now().timestamp(),
        })
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL query against a shop.
    ///
    /// Variables are serialized into the request body; nothing is spliced
    /// into the query text.
    ///
    /// # Errors
    ///
    /// - `Http` if the request never completes
    /// - `RateLimited` / `Unauthorized` for 429 and 401/403 responses
    /// - `Status` for other non-success responses without GraphQL errors
    /// - `Parse` if a success response is not valid JSON or its data does
    ///   not match the query
    /// - `GraphQL` if the response carries query-level errors (whatever the
    ///   status) or no data
    pub async fn execute<Q: GraphQLQuery>(
        &self,
        credential: &ShopCredential,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError> {
        let endpoint = self.graphql_endpoint(&credential.shop);
        let body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&endpoint)
            .header("X-Shopify-Access-Token", credential.access_token.expose())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;
        classify_response(status, &response_text)
    }
}

/// Turn a GraphQL response into typed data or the error it represents.
///
/// The body is read as untyped JSON first so that an `errors` array is
/// reported even when `data` does not fit the query's shape (Shopify
/// answers access problems with `200`, `errors` and null fields).
fn classify_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, ShopifyError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ShopifyError::Unauthorized(
            "Invalid or expired access token".to_string(),
        ));
    }

    let response = match serde_json::from_str::<Response<serde_json::Value>>(body) {
        Ok(response) => response,
        Err(e) if status.is_success() => {
            tracing::error!(
                error = %e,
                body = %snippet(body),
                "Failed to parse Shopify GraphQL response"
            );
            return Err(ShopifyError::Parse(e));
        }
        Err(_) => return Err(status_error(status, body)),
    };

    if let Some(errors) = response.errors
        && !errors.is_empty()
    {
        tracing::debug!(status = %status, errors = ?errors, "GraphQL errors in response");
        return Err(ShopifyError::GraphQL(convert_errors(errors)));
    }

    if !status.is_success() {
        return Err(status_error(status, body));
    }

    let data = response.data.filter(|d| !d.is_null()).ok_or_else(|| {
        tracing::error!(
            body = %snippet(body),
            "Shopify GraphQL response has no data and no errors"
        );
        ShopifyError::GraphQL(vec![GraphQLError {
            message: "No data in response".to_string(),
            locations: vec![],
            path: vec![],
        }])
    })?;

    serde_json::from_value(data).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %snippet(body),
            "Shopify GraphQL data does not match the query"
        );
        ShopifyError::Parse(e)
    })
}

fn status_error(status: StatusCode, body: &str) -> ShopifyError {
    tracing::error!(
        status = %status,
        body = %snippet(body),
        "Shopify API returned non-success status"
    );
    ShopifyError::Status {
        status: status.as_u16(),
        body: snippet(body),
    }
}

fn convert_errors(errors: Vec<graphql_client::Error>) -> Vec<GraphQLError> {
    errors
        .into_iter()
        .map(|e| GraphQLError {
            message: e.message,
            locations: e.locations.map_or_else(Vec::new, |locs| {
                locs.into_iter()
                    .map(|l| GraphQLErrorLocation {
                        line: i64::from(l.line),
                        column: i64::from(l.column),
                    })
                    .collect()
            }),
            path: e.path.map_or_else(Vec::new, |p| {
                p.into_iter()
                    .map(|fragment| match fragment {
                        graphql_client::PathFragment::Key(s) => serde_json::Value::String(s),
                        graphql_client::PathFragment::Index(i) => {
                            serde_json::Value::Number(i.into())
                        }
                    })
                    .collect()
            }),
        })
        .collect()
}

fn snippet(text: &str) -> String {
    text.chars().take(BODY_SNIPPET_CHARS).collect()
}
