//! COA collection against a real installed shop.
//!
//! Requires `COA_TEST_SHOP` to name a shop that completed the install flow
//! against the database in `COA_DATABASE_URL`, plus the server's Shopify
//! environment variables.

use coa_bridge_core::{CoaDate, ShopDomain};
use coa_bridge_integration_tests::database_url;
use coa_bridge_server::config::ServerConfig;
use coa_bridge_server::db::{self, ShopSessionRepository};
use coa_bridge_server::shopify::{AdminClient, CoaCollector};

#[tokio::test]
#[ignore = "Requires an installed Shopify shop and credentials"]
async fn test_collect_live_coas_sorted() {
    let shop = std::env::var("COA_TEST_SHOP").expect("COA_TEST_SHOP must be set");
    let shop = ShopDomain::parse(&shop).expect("valid shop");
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    let pool = db::create_pool(&database_url())
        .await
        .expect("Failed to connect to database");
    let credential = ShopSessionRepository::new(&pool)
        .find_credential(&shop)
        .await
        .expect("lookup")
        .expect("shop must be installed");

    let client = AdminClient::new(&config.shopify);
    let records = CoaCollector::new(&client)
        .collect(&credential)
        .await
        .expect("Failed to collect COAs");

    let dates: Vec<CoaDate> = records
        .iter()
        .map(|r| CoaDate::parse(&r.date).expect("collected dates parse"))
        .collect();
    assert!(dates.is_sorted_by(|a, b| a >= b), "not sorted newest first");
    assert!(records.iter().all(|r| !r.product.is_empty()));
}
