//! Certificate-of-analysis API.

use axum::{
    Json,
    extract::{Query, State},
};
use coa_bridge_core::{CoaRecord, ShopCredential, ShopDomain};
use serde::Deserialize;
use tracing::instrument;

use crate::config::CoaConfig;
use crate::db::ShopSessionRepository;
use crate::error::{AppError, Result};
use crate::shopify::{CoaCollector, CoaPageSource};
use crate::state::AppState;

/// Query parameters for `GET /api/coas`.
#[derive(Debug, Deserialize)]
pub struct CoaQuery {
    pub shop: String,
}

/// List a shop's certificates of analysis, newest first.
///
/// # Route
///
/// `GET /api/coas?shop=<shop>.myshopify.com`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<CoaQuery>,
) -> Result<Json<Vec<CoaRecord>>> {
    let shop = ShopDomain::parse(&query.shop).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let credential = ShopSessionRepository::new(state.pool())
        .find_credential(&shop)
        .await?
        .ok_or_else(|| AppError::BadRequest("No session found for shop".to_string()))?;

    let records = collect_within_deadline(state.shopify(), &credential, &state.config().coa).await?;

    Ok(Json(records))
}

/// Run one collection under the configured page ceiling and deadline.
async fn collect_within_deadline<S: CoaPageSource>(
    source: &S,
    credential: &ShopCredential,
    limits: &CoaConfig,
) -> Result<Vec<CoaRecord>> {
    let collector = CoaCollector::new(source).with_max_pages(limits.max_pages);

    tokio::time::timeout(limits.request_timeout, collector.collect(credential))
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "COA collection for {} exceeded {:?}",
                credential.shop, limits.request_timeout
            ))
        })?
        .map_err(AppError::from)
}
