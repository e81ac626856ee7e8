//! Shopify app install (OAuth) route handlers.
//!
//! - `begin`: stores a CSRF `state` and redirects to the shop's consent page
//! - `callback`: verifies the request, exchanges the code, stores the token

use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use coa_bridge_core::ShopDomain;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::ShopSessionRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

const OAUTH_STATE_KEY: &str = "shopify_oauth_state";
const OAUTH_SHOP_KEY: &str = "shopify_oauth_shop";

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Query Parameters
// =============================================================================

/// Query parameters for `GET /auth`.
#[derive(Debug, Deserialize)]
pub struct InstallParams {
    pub shop: String,
}

/// Query parameters Shopify sends to `GET /auth/callback`.
///
/// `hmac`, `timestamp` and `host` are read from the raw query during
/// signature verification.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub shop: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// =============================================================================
// HMAC Verification
// =============================================================================

/// Verify the HMAC signature Shopify attaches to the OAuth callback.
///
/// The message is every query parameter except `hmac` and `signature`,
/// decoded, sorted by key and joined as `k=v` with `&`. The comparison is
/// constant-time.
fn verify_shopify_hmac(raw_query: &str, api_secret: &str) -> bool {
    let mut provided = None;
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        match key.as_ref() {
            "hmac" => provided = Some(value.into_owned()),
            "signature" => {}
            _ => pairs.push((key.into_owned(), value.into_owned())),
        }
    }

    let Some(provided) = provided else {
        return false;
    };
    let Ok(expected) = hex::decode(provided) else {
        return false;
    };

    pairs.sort();

    let message = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let Ok(mut mac) = HmacSha256::new_from_slice(api_secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());

    mac.verify_slice(&expected).is_ok()
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Start the install flow for a shop.
///
/// # Route
///
/// `GET /auth?shop=<shop>.myshopify.com`
#[instrument(skip(state, session))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<InstallParams>,
) -> Result<Response> {
    let shop =
        ShopDomain::parse(&params.shop).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let oauth_state = uuid::Uuid::new_v4().to_string();

    session
        .insert(OAUTH_STATE_KEY, &oauth_state)
        .await
        .map_err(|e| AppError::Internal(format!("failed to store OAuth state: {e}")))?;
    session
        .insert(OAUTH_SHOP_KEY, shop.as_str())
        .await
        .map_err(|e| AppError::Internal(format!("failed to store OAuth shop: {e}")))?;

    let redirect_uri = state.config().oauth_callback_url();
    let auth_url = state
        .shopify()
        .authorization_url(&shop, &redirect_uri, &oauth_state);

    tracing::info!(shop = %shop, "Redirecting to Shopify OAuth");
    Ok(Redirect::to(&auth_url).into_response())
}

/// Finish the install flow.
///
/// # Route
///
/// `GET /auth/callback`
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Response> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or_default();
        tracing::warn!("Shopify OAuth error: {} - {}", error, description);
        return Err(AppError::BadRequest(format!(
            "Shopify denied the install: {error}"
        )));
    }

    if !verify_shopify_hmac(raw_query.as_deref().unwrap_or_default(), state.shopify().api_secret())
    {
        tracing::warn!("Invalid HMAC signature in OAuth callback");
        return Err(AppError::BadRequest("Invalid HMAC signature".to_string()));
    }

    let Some(callback_state) = &params.state else {
        return Err(AppError::BadRequest("Missing state parameter".to_string()));
    };

    let stored_state: Option<String> = session.get(OAUTH_STATE_KEY).await.ok().flatten();
    if stored_state.as_ref() != Some(callback_state) {
        tracing::warn!("OAuth state mismatch - possible CSRF attack");
        return Err(AppError::BadRequest("Invalid OAuth state".to_string()));
    }

    let shop = params
        .shop
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Missing shop parameter".to_string()))
        .and_then(|s| ShopDomain::parse(s).map_err(|e| AppError::BadRequest(e.to_string())))?;

    let stored_shop: Option<String> = session.get(OAUTH_SHOP_KEY).await.ok().flatten();
    if stored_shop.as_deref() != Some(shop.as_str()) {
        tracing::warn!(shop = %shop, "OAuth callback shop differs from install request");
        return Err(AppError::BadRequest("Invalid OAuth state".to_string()));
    }

    // One-time use
    let _ = session.remove::<String>(OAUTH_STATE_KEY).await;
    let _ = session.remove::<String>(OAUTH_SHOP_KEY).await;

    let Some(code) = &params.code else {
        return Err(AppError::BadRequest(
            "Missing authorization code".to_string(),
        ));
    };

    let token = state.shopify().exchange_code(&shop, code).await?;

    ShopSessionRepository::new(state.pool()).save(&token).await?;

    tracing::info!(shop = %shop, scope = %token.scope, "Shop installed");

    let app_url = format!("https://{shop}/admin/apps/{}", state.shopify().api_key());
    Ok(Redirect::to(&app_url).into_response())
}
