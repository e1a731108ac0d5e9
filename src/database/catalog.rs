//! Products, warehouses and availability

use super::{json_column, now_timestamp, to_json_text, DbResult};
use crate::catalog::{CatalogItem, Region, StockLevels};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Counts from one catalog upsert
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CatalogUpsert {
    /// SKUs processed
    pub products: usize,
    /// Product rows inserted or changed
    pub products_changed: usize,
    /// Availability rows inserted or changed
    pub availability_changed: usize,
}

/// Write the static region table; returns warehouse ids by region
pub fn upsert_warehouses(conn: &mut Connection) -> DbResult<HashMap<Region, i64>> {
    let tx = conn.transaction()?;
    let ids = upsert_warehouses_tx(&tx)?;
    tx.commit()?;
    Ok(ids)
}

fn upsert_warehouses_tx(tx: &Transaction<'_>) -> DbResult<HashMap<Region, i64>> {
    let now = now_timestamp();
    let mut upsert = tx.prepare_cached(
        "INSERT INTO warehouses (code, name, locations, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(code) DO UPDATE SET
             name = excluded.name,
             locations = excluded.locations,
             updated_at = excluded.updated_at
         WHERE warehouses.name IS NOT excluded.name
            OR warehouses.locations IS NOT excluded.locations",
    )?;
    let mut select = tx.prepare_cached("SELECT id FROM warehouses WHERE code = ?1")?;

    let mut ids = HashMap::new();
    for region in Region::ALL {
        let locations = to_json_text(&region.locations())?;
        upsert.execute(params![region.code(), region.display_name(), locations, now])?;
        let id: i64 = select.query_row(params![region.code()], |row| row.get(0))?;
        ids.insert(region, id);
    }
    Ok(ids)
}

/// Upsert products and their per-region availability.
///
/// Quantity fields are replaced wholesale; every region gets a row for every
/// SKU so stock that disappeared from the ERP is written back as zero. SKUs
/// missing from `items` altogether keep their product row but drop to zero.
pub fn upsert_catalog(conn: &mut Connection, items: &[CatalogItem]) -> DbResult<CatalogUpsert> {
    let tx = conn.transaction()?;
    let result = upsert_catalog_tx(&tx, items)?;
    tx.commit()?;
    Ok(result)
}

fn upsert_catalog_tx(tx: &Transaction<'_>, items: &[CatalogItem]) -> DbResult<CatalogUpsert> {
    let warehouse_ids = upsert_warehouses_tx(tx)?;
    let now = now_timestamp();

    let mut upsert_product = tx.prepare_cached(
        "INSERT INTO products
         (sku, erp_id, name, brand, barcode, category, image_url, price, price_tiers, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(sku) DO UPDATE SET
             erp_id = excluded.erp_id,
             name = excluded.name,
             brand = excluded.brand,
             barcode = excluded.barcode,
             category = excluded.category,
             image_url = excluded.image_url,
             price = excluded.price,
             price_tiers = excluded.price_tiers,
             updated_at = excluded.updated_at
         WHERE products.erp_id IS NOT excluded.erp_id
            OR products.name IS NOT excluded.name
            OR products.brand IS NOT excluded.brand
            OR products.barcode IS NOT excluded.barcode
            OR products.category IS NOT excluded.category
            OR products.image_url IS NOT excluded.image_url
            OR products.price IS NOT excluded.price
            OR products.price_tiers IS NOT excluded.price_tiers",
    )?;
    let mut product_id = tx.prepare_cached("SELECT id FROM products WHERE sku = ?1")?;
    let mut upsert_stock = tx.prepare_cached(
        "INSERT INTO availability
         (product_id, warehouse_id, on_hand, allocated, available, on_order, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(product_id, warehouse_id) DO UPDATE SET
             on_hand = excluded.on_hand,
             allocated = excluded.allocated,
             available = excluded.available,
             on_order = excluded.on_order,
             updated_at = excluded.updated_at
         WHERE availability.on_hand IS NOT excluded.on_hand
            OR availability.allocated IS NOT excluded.allocated
            OR availability.available IS NOT excluded.available
            OR availability.on_order IS NOT excluded.on_order",
    )?;

    let mut result = CatalogUpsert::default();
    let mut seen = HashSet::new();
    for item in items {
        let tiers = to_json_text(&item.price_tiers)?;
        result.products_changed += upsert_product.execute(params![
            &item.sku,
            &item.erp_id,
            &item.name,
            &item.brand,
            &item.barcode,
            &item.category,
            &item.image_url,
            item.price,
            tiers,
            &now,
        ])?;
        let id: i64 = product_id.query_row(params![&item.sku], |row| row.get(0))?;
        seen.insert(id);

        for region in Region::ALL {
            let Some(warehouse_id) = warehouse_ids.get(&region) else {
                continue;
            };
            let stock = item.region(region);
            result.availability_changed += upsert_stock.execute(params![
                id,
                warehouse_id,
                stock.on_hand,
                stock.allocated,
                stock.available,
                stock.on_order,
                &now,
            ])?;
        }
        result.products += 1;
    }
    result.availability_changed += zero_missing_tx(tx, &seen, &now)?;

    log::info!(
        "Upserted {} products ({} changed, {} availability rows changed)",
        result.products,
        result.products_changed,
        result.availability_changed
    );
    Ok(result)
}

/// Zero the stock of every cached product not in `seen`; returns rows changed
fn zero_missing_tx(tx: &Transaction<'_>, seen: &HashSet<i64>, now: &str) -> DbResult<usize> {
    let cached: Vec<i64> = tx
        .prepare_cached("SELECT id FROM products")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    let mut zero = tx.prepare_cached(
        "UPDATE availability
         SET on_hand = 0, allocated = 0, available = 0, on_order = 0, updated_at = ?2
         WHERE product_id = ?1
           AND (on_hand != 0 OR allocated != 0 OR available != 0 OR on_order != 0)",
    )?;

    let mut changed = 0;
    for id in cached.into_iter().filter(|id| !seen.contains(id)) {
        changed += zero.execute(params![id, now])?;
    }
    if changed > 0 {
        log::info!("Zeroed {} availability rows for SKUs no longer in stock", changed);
    }
    Ok(changed)
}

// ── Web API Query Functions ────────────────────────────────────────────────

/// Warehouse region as exposed by the API
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WarehouseRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub locations: Vec<String>,
}

/// Product with its regional stock
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductSummary {
    pub id: i64,
    pub sku: String,
    #[serde(skip_serializing)]
    pub erp_id: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub category: String,
    pub image_url: Option<String>,
    pub price: f64,
    #[serde(skip_serializing)]
    pub price_tiers: BTreeMap<String, f64>,
    /// Keyed by region code
    pub availability: BTreeMap<String, StockLevels>,
    pub total_available: f64,
    pub updated_at: String,
}

impl ProductSummary {
    /// Price for a customer tier, falling back to the list price
    pub fn price_for_tier(&self, tier: Option<&str>) -> f64 {
        tier.and_then(|t| self.price_tiers.get(t))
            .copied()
            .unwrap_or(self.price)
    }
}

/// One availability row joined with its SKU and region
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailabilityRecord {
    pub sku: String,
    pub warehouse: String,
    pub on_hand: f64,
    pub allocated: f64,
    pub available: f64,
    pub on_order: f64,
    pub updated_at: String,
}

/// Product list filters; `None` means "any"
#[derive(Debug, Clone)]
pub struct ProductFilter {
    /// Substring of SKU or name, or an exact barcode
    pub query: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub in_stock_only: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            query: None,
            brand: None,
            category: None,
            in_stock_only: false,
            limit: 50,
            offset: 0,
        }
    }
}

/// A page of products plus the unpaged match count
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub items: Vec<ProductSummary>,
    pub total: i64,
    pub limit: usize,
    pub offset: usize,
}

const PRODUCT_COLUMNS: &str =
    "id, sku, erp_id, name, brand, barcode, category, image_url, price, price_tiers, updated_at";

fn product_from_row(row: &Row<'_>) -> DbResult<ProductSummary> {
    Ok(ProductSummary {
        id: row.get(0)?,
        sku: row.get(1)?,
        erp_id: row.get(2)?,
        name: row.get(3)?,
        brand: row.get(4)?,
        barcode: row.get(5)?,
        category: row.get(6)?,
        image_url: row.get(7)?,
        price: row.get(8)?,
        price_tiers: json_column(row, 9)?,
        availability: BTreeMap::new(),
        total_available: 0.0,
        updated_at: row.get(10)?,
    })
}

fn attach_availability(conn: &Connection, product: &mut ProductSummary) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT w.code, a.on_hand, a.allocated, a.available, a.on_order
         FROM availability a
         JOIN warehouses w ON w.id = a.warehouse_id
         WHERE a.product_id = ?1
         ORDER BY w.code",
    )?;
    let rows = stmt.query_map(params![product.id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            StockLevels {
                on_hand: row.get(1)?,
                allocated: row.get(2)?,
                available: row.get(3)?,
                on_order: row.get(4)?,
            },
        ))
    })?;

    for row in rows {
        let (code, stock) = row?;
        product.total_available += stock.available;
        product.availability.insert(code, stock);
    }
    Ok(())
}

/// List products matching `filter`, ordered by SKU
pub fn list_products(conn: &Connection, filter: &ProductFilter) -> DbResult<ProductPage> {
    let pattern = filter.query.as_ref().map(|q| format!("%{}%", q.trim()));
    let conditions = "WHERE (?1 IS NULL OR sku LIKE ?1 OR name LIKE ?1 OR barcode = ?2)
           AND (?3 IS NULL OR brand = ?3 COLLATE NOCASE)
           AND (?4 IS NULL OR category = ?4 COLLATE NOCASE)
           AND (?5 = 0 OR EXISTS (
                SELECT 1 FROM availability a
                WHERE a.product_id = products.id AND a.available > 0))";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM products {}", conditions),
        params![
            pattern,
            filter.query,
            filter.brand,
            filter.category,
            filter.in_stock_only
        ],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM products {} ORDER BY sku LIMIT ?6 OFFSET ?7",
        PRODUCT_COLUMNS, conditions
    ))?;
    let items: DbResult<Vec<ProductSummary>> = stmt
        .query_map(
            params![
                pattern,
                filter.query,
                filter.brand,
                filter.category,
                filter.in_stock_only,
                filter.limit as i64,
                filter.offset as i64
            ],
            product_from_row,
        )?
        .collect();

    let mut items = items?;
    for item in &mut items {
        attach_availability(conn, item)?;
    }

    Ok(ProductPage {
        items,
        total,
        limit: filter.limit,
        offset: filter.offset,
    })
}

/// Get one product by SKU, with availability
pub fn get_product(conn: &Connection, sku: &str) -> DbResult<Option<ProductSummary>> {
    let product = conn
        .query_row(
            &format!("SELECT {} FROM products WHERE sku = ?1", PRODUCT_COLUMNS),
            params![sku],
            product_from_row,
        )
        .optional()?;

    match product {
        Some(mut product) => {
            attach_availability(conn, &mut product)?;
            Ok(Some(product))
        }
        None => Ok(None),
    }
}

/// All warehouse regions, ordered by code
pub fn list_warehouses(conn: &Connection) -> DbResult<Vec<WarehouseRow>> {
    let mut stmt =
        conn.prepare("SELECT id, code, name, locations FROM warehouses ORDER BY code")?;
    let rows: DbResult<Vec<WarehouseRow>> = stmt
        .query_map([], |row| {
            Ok(WarehouseRow {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
                locations: json_column(row, 3)?,
            })
        })?
        .collect();
    rows
}

/// Availability rows, optionally for a single SKU
pub fn list_availability(conn: &Connection, sku: Option<&str>) -> DbResult<Vec<AvailabilityRecord>> {
    let mut stmt = conn.prepare(
        "SELECT p.sku, w.code, a.on_hand, a.allocated, a.available, a.on_order, a.updated_at
         FROM availability a
         JOIN products p ON p.id = a.product_id
         JOIN warehouses w ON w.id = a.warehouse_id
         WHERE ?1 IS NULL OR p.sku = ?1
         ORDER BY p.sku, w.code",
    )?;
    let rows: DbResult<Vec<AvailabilityRecord>> = stmt
        .query_map(params![sku], |row| {
            Ok(AvailabilityRecord {
                sku: row.get(0)?,
                warehouse: row.get(1)?,
                on_hand: row.get(2)?,
                allocated: row.get(3)?,
                available: row.get(4)?,
                on_order: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?
        .collect();
    rows
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
