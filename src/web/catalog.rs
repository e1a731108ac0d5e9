//! Product, warehouse and availability endpoints

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use super::{ok, ApiError, ApiResult, AppState, CurrentUser};
use crate::database::{
    self, get_customer, get_product, list_availability, list_products, list_warehouses,
    table_count, AvailabilityRecord, CountedTable, ProductFilter, ProductPage, ProductSummary,
    UserRow, WarehouseRow,
};
use rusqlite::Connection;

const MAX_PAGE: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    q: Option<String>,
    brand: Option<String>,
    category: Option<String>,
    #[serde(default)]
    in_stock: bool,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    sku: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    products: i64,
    sync_running: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Price tier of the caller's company; `None` for admins or untiered customers
pub(crate) fn price_tier(conn: &Connection, user: &UserRow) -> Result<Option<String>, ApiError> {
    let Some(customer_id) = user.customer_id else {
        return Ok(None);
    };
    Ok(get_customer(conn, customer_id)?.and_then(|c| c.price_tier))
}

fn apply_tier(product: &mut ProductSummary, tier: Option<&str>) {
    product.price = product.price_for_tier(tier);
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> ApiResult<Health> {
    let products = {
        let conn = database::lock(&state.db);
        table_count(&conn, CountedTable::Products)?
    };
    ok(Health {
        status: "ok",
        products,
        sync_running: state.scheduler.is_running(),
    })
}

/// GET /api/products?q=&brand=&category=&in_stock=&limit=&offset=
///
/// Prices are shown at the caller's tier.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ProductsQuery>,
) -> ApiResult<ProductPage> {
    let filter = ProductFilter {
        query: non_empty(params.q),
        brand: non_empty(params.brand),
        category: non_empty(params.category),
        in_stock_only: params.in_stock,
        limit: params.limit.unwrap_or(50).clamp(1, MAX_PAGE),
        offset: params.offset.unwrap_or(0),
    };

    let conn = database::lock(&state.db);
    let tier = price_tier(&conn, &user)?;
    let mut page = list_products(&conn, &filter)?;
    for product in &mut page.items {
        apply_tier(product, tier.as_deref());
    }
    ok(page)
}

/// GET /api/products/{sku}
pub async fn detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sku): Path<String>,
) -> ApiResult<ProductSummary> {
    let conn = database::lock(&state.db);
    let tier = price_tier(&conn, &user)?;
    let mut product = get_product(&conn, &sku)?
        .ok_or_else(|| ApiError::NotFound(format!("unknown SKU {}", sku)))?;
    apply_tier(&mut product, tier.as_deref());
    ok(product)
}

/// GET /api/warehouses
pub async fn warehouses(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Vec<WarehouseRow>> {
    let conn = database::lock(&state.db);
    ok(list_warehouses(&conn)?)
}

/// GET /api/availability?sku=
pub async fn availability(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<AvailabilityQuery>,
) -> ApiResult<Vec<AvailabilityRecord>> {
    let sku = non_empty(params.sku);
    let conn = database::lock(&state.db);
    ok(list_availability(&conn, sku.as_deref())?)
}
