//! One-off COA collection for a shop.
//!
//! Uses the same configuration as the server (`ServerConfig::from_env`) and
//! the stored offline token, then prints the sorted list as pretty JSON.

use coa_bridge_core::ShopDomain;
use coa_bridge_server::config::ServerConfig;
use coa_bridge_server::db::{self, ShopSessionRepository};
use coa_bridge_server::shopify::{AdminClient, CoaCollector};

use super::CommandError;

/// Collect and print the COA list for `shop`.
///
/// # Errors
///
/// Returns `CommandError` if configuration is missing, the shop has no
/// stored session, or collection fails.
pub async fn run(shop: &str, max_pages: Option<usize>) -> Result<(), CommandError> {
    let shop = ShopDomain::parse(shop)?;
    let config = ServerConfig::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    let credential = ShopSessionRepository::new(&pool)
        .find_credential(&shop)
        .await?
        .ok_or_else(|| CommandError::NoSession(shop.to_string()))?;

    let client = AdminClient::new(&config.shopify);
    let records = CoaCollector::new(&client)
        .with_max_pages(max_pages.unwrap_or(config.coa.max_pages))
        .collect(&credential)
        .await?;

    let json = serde_json::to_string_pretty(&records)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }

    Ok(())
}
