//! Cart and checkout endpoints

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use chrono_tz::Africa::Johannesburg;
use serde::Deserialize;
use serde_json::json;

use super::catalog::price_tier;
use super::{ok, ApiError, ApiResult, AppState, CurrentUser};
use crate::cart::{price_cart, CartView};
use crate::catalog::Region;
use crate::database::{self, get_customer, get_product, insert_quote, NewQuote, QuoteRow};
use crate::dear::QuoteRequest;

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    sku: String,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    /// Region code; defaults to JHB
    region: Option<String>,
    reference: Option<String>,
    note: Option<String>,
}

fn priced_cart(state: &AppState, user: &database::UserRow) -> Result<CartView, ApiError> {
    let lines = state.carts.get(user.id);
    let conn = database::lock(&state.db);
    let tier = price_tier(&conn, user)?;
    Ok(price_cart(&conn, &lines, tier.as_deref())?)
}

/// GET /api/cart
pub async fn view(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<CartView> {
    ok(priced_cart(&state, &user)?)
}

/// POST /api/cart {sku, quantity}
pub async fn add(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AddToCart>,
) -> ApiResult<CartView> {
    if body.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
    }
    let sku = body.sku.trim();
    let exists = {
        let conn = database::lock(&state.db);
        get_product(&conn, sku)?.is_some()
    };
    if !exists {
        return Err(ApiError::NotFound(format!("unknown SKU {}", sku)));
    }

    state.carts.add(user.id, sku, body.quantity);
    ok(priced_cart(&state, &user)?)
}

/// DELETE /api/cart
pub async fn clear(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<CartView> {
    state.carts.clear(user.id);
    ok(priced_cart(&state, &user)?)
}

/// DELETE /api/cart/{sku}
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sku): Path<String>,
) -> ApiResult<CartView> {
    if !state.carts.remove(user.id, &sku) {
        return Err(ApiError::NotFound(format!("{} is not in the cart", sku)));
    }
    ok(priced_cart(&state, &user)?)
}

/// POST /api/cart/checkout {region?, reference?, note?}
///
/// Raises an unauthorised quote in the ERP, records it and empties the cart.
/// The cart is taken up front so concurrent checkouts submit it once; it is
/// put back when the ERP call fails.
pub async fn checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Option<Json<CheckoutRequest>>,
) -> ApiResult<QuoteRow> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let region = match body.region.as_deref().map(str::trim) {
        None | Some("") => Region::Jhb,
        Some(code) => code.parse().map_err(ApiError::BadRequest)?,
    };

    let customer = match user.customer_id {
        Some(id) => {
            let conn = database::lock(&state.db);
            get_customer(&conn, id)?
        }
        None => None,
    };
    let customer = customer
        .ok_or_else(|| ApiError::Forbidden("no customer account linked to this login".to_string()))?;

    let lines = state.carts.take(user.id);
    if lines.is_empty() {
        return Err(ApiError::BadRequest("cart is empty".to_string()));
    }
    let priced = {
        let conn = database::lock(&state.db);
        price_cart(&conn, &lines, customer.price_tier.as_deref())
    };
    let cart = match priced {
        Ok(cart) if !cart.is_empty() => cart,
        Ok(_) => {
            state.carts.restore(user.id, lines);
            return Err(ApiError::BadRequest("cart has no orderable items".to_string()));
        }
        Err(e) => {
            state.carts.restore(user.id, lines);
            return Err(e.into());
        }
    };

    let request = QuoteRequest {
        customer_id: customer.erp_customer_id.clone(),
        customer_name: customer.name.clone(),
        location: region.primary_location().to_string(),
        price_tier: customer.price_tier.clone(),
        reference: body.reference.clone(),
        note: body.note.clone(),
        order_date: Utc::now()
            .with_timezone(&Johannesburg)
            .format("%Y-%m-%d")
            .to_string(),
        lines: cart.quote_lines(),
    };

    let receipt = match state.dear.create_quote(&request).await {
        Ok(receipt) => receipt,
        Err(e) => {
            log::error!("Quote for customer {} failed: {}", customer.name, e);
            state.carts.restore(user.id, lines);
            return Err(ApiError::Upstream(format!("ERP rejected the quote: {}", e)));
        }
    };

    let quote = {
        let conn = database::lock(&state.db);
        insert_quote(
            &conn,
            &NewQuote {
                user_id: user.id,
                customer_id: customer.id,
                sale_id: receipt.sale_id,
                status: receipt.status,
                region: region.code().to_string(),
                total: cart.subtotal,
                payload: json!({
                    "location": request.location,
                    "reference": request.reference,
                    "note": request.note,
                    "price_tier": cart.price_tier,
                    "lines": cart.lines,
                    "subtotal": cart.subtotal,
                }),
            },
        )?
    };

    log::info!(
        "Quote {} ({}) submitted for {} in {}",
        quote.id,
        quote.sale_id,
        quote.customer_name,
        region
    );
    ok(quote)
}
