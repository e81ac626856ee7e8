//! Installed-shop management.

use coa_bridge_core::ShopDomain;
use coa_bridge_server::db::{self, ShopSessionRepository};

use super::{CommandError, database_url};

/// Delete the stored token for `shop`.
///
/// The shop must reinstall the app before `/api/coas` serves it again.
///
/// # Errors
///
/// Returns `CommandError` if the shop is invalid or the delete fails.
pub async fn forget(shop: &str) -> Result<(), CommandError> {
    let shop = ShopDomain::parse(shop)?;
    let pool = db::create_pool(&database_url()?).await?;

    if ShopSessionRepository::new(&pool).delete(&shop).await? {
        tracing::info!(shop = %shop, "Shop session deleted");
    } else {
        tracing::warn!(shop = %shop, "No session stored for shop");
    }

    Ok(())
}
