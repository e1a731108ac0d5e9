//! One sync step per ERP data set: fetch, transform, upsert
//!
//! ERP calls happen without the database lock; the lock is taken only for the
//! final transactional write.

use crate::catalog::{aggregate, PriceList, ALLOWED_WAREHOUSES};
use crate::database::{self, upsert_catalog, upsert_customers, upsert_warehouses, SharedDb};
use crate::dear::DearClient;
use crate::error::Result;

/// Check the ERP's location list against the regions table and refresh warehouses.
///
/// Returns the number of ERP locations seen.
pub async fn sync_locations(dear: &DearClient, db: &SharedDb) -> Result<usize> {
    let locations = dear.fetch_locations().await?;

    for code in ALLOWED_WAREHOUSES {
        match locations.iter().find(|l| l.name == code) {
            None => log::warn!("Location {} is not defined in the ERP", code),
            Some(l) if l.deprecated => log::warn!("Location {} is deprecated in the ERP", code),
            Some(_) => {}
        }
    }

    let regions = {
        let mut conn = database::lock(db);
        upsert_warehouses(&mut conn)?
    };
    log::info!(
        "Location sync: {} ERP locations, {} regions",
        locations.len(),
        regions.len()
    );
    Ok(locations.len())
}

/// Pull availability for the allowed warehouses plus the product feed,
/// aggregate into regions and write the catalog.
///
/// Returns the number of SKUs written.
pub async fn sync_catalog(dear: &DearClient, db: &SharedDb) -> Result<usize> {
    let rows = dear.fetch_availability(&ALLOWED_WAREHOUSES).await?;
    let products = dear.fetch_products().await?;
    let prices = PriceList::from_products(products);
    if prices.is_empty() {
        log::warn!("Product feed is empty, every SKU will be listed at 0");
    }
    log::info!(
        "Fetched {} availability rows and {} priced products",
        rows.len(),
        prices.len()
    );

    let snapshot = aggregate(&rows, &prices);
    if snapshot.unmapped_rows > 0 {
        log::warn!("Ignored {} rows at unmapped locations", snapshot.unmapped_rows);
    }
    if snapshot.unpriced_skus > 0 {
        log::warn!("{} SKUs have no pricing, listed at 0", snapshot.unpriced_skus);
    }

    let result = {
        let mut conn = database::lock(db);
        upsert_catalog(&mut conn, &snapshot.items)?
    };
    log::info!(
        "Catalog sync: {} SKUs ({} products changed, {} availability rows changed)",
        result.products,
        result.products_changed,
        result.availability_changed
    );
    Ok(result.products)
}

/// Mirror ERP customers; returns the number of customers fetched.
pub async fn sync_customers(dear: &DearClient, db: &SharedDb) -> Result<usize> {
    let customers = dear.fetch_customers().await?;
    let changed = {
        let mut conn = database::lock(db);
        upsert_customers(&mut conn, &customers)?
    };
    log::info!(
        "Customer sync: {} customers ({} changed)",
        customers.len(),
        changed
    );
    Ok(customers.len())
}
