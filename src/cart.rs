//! Per-user shopping carts (process memory only) and cart pricing

use crate::database::{get_product, DbResult};
use crate::dear::QuoteLine;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// One SKU in a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub sku: String,
    pub quantity: u32,
}

/// Carts keyed by user id. Lost on restart.
#[derive(Debug, Default)]
pub struct CartStore {
    carts: RwLock<HashMap<i64, Vec<CartLine>>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines in the user's cart, in insertion order
    pub fn get(&self, user_id: i64) -> Vec<CartLine> {
        let carts = self.carts.read().unwrap_or_else(PoisonError::into_inner);
        carts.get(&user_id).cloned().unwrap_or_default()
    }

    /// Add `quantity` of `sku`, merging with an existing line. Zero is ignored.
    pub fn add(&self, user_id: i64, sku: &str, quantity: u32) -> Vec<CartLine> {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        let lines = carts.entry(user_id).or_default();
        if quantity > 0 {
            match lines.iter_mut().find(|line| line.sku == sku) {
                Some(line) => line.quantity = line.quantity.saturating_add(quantity),
                None => lines.push(CartLine {
                    sku: sku.to_string(),
                    quantity,
                }),
            }
        }
        lines.clone()
    }

    /// Drop a SKU from the cart. Returns false if it was not there.
    pub fn remove(&self, user_id: i64, sku: &str) -> bool {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        let Some(lines) = carts.get_mut(&user_id) else {
            return false;
        };
        let before = lines.len();
        lines.retain(|line| line.sku != sku);
        before != lines.len()
    }

    pub fn clear(&self, user_id: i64) {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        carts.remove(&user_id);
    }

    /// Empty the cart and hand back its lines. Only one caller gets them.
    pub fn take(&self, user_id: i64) -> Vec<CartLine> {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        carts.remove(&user_id).unwrap_or_default()
    }

    /// Put taken lines back in front of anything added since
    pub fn restore(&self, user_id: i64, taken: Vec<CartLine>) {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        let added = carts.remove(&user_id).unwrap_or_default();
        let mut lines = taken;
        for line in added {
            match lines.iter_mut().find(|l| l.sku == line.sku) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
                None => lines.push(line),
            }
        }
        if !lines.is_empty() {
            carts.insert(user_id, lines);
        }
    }
}

/// A cart line priced from the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLine {
    pub sku: String,
    #[serde(skip_serializing)]
    pub erp_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub line_total: f64,
    pub available: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub lines: Vec<PricedLine>,
    pub subtotal: f64,
    pub price_tier: Option<String>,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quote_lines(&self) -> Vec<QuoteLine> {
        self.lines
            .iter()
            .map(|line| QuoteLine {
                product_id: line.erp_id.clone(),
                sku: line.sku.clone(),
                name: line.name.clone(),
                quantity: f64::from(line.quantity),
                price: line.unit_price,
            })
            .collect()
    }
}

/// Price `lines` at `tier` (list price when the tier is unknown).
///
/// SKUs no longer in the cache are left out.
pub fn price_cart(conn: &Connection, lines: &[CartLine], tier: Option<&str>) -> DbResult<CartView> {
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(product) = get_product(conn, &line.sku)? else {
            log::warn!("Cart SKU {} is not in the catalog, skipping", line.sku);
            continue;
        };
        let unit_price = product.price_for_tier(tier);
        priced.push(PricedLine {
            sku: product.sku,
            erp_id: product.erp_id,
            name: product.name,
            quantity: line.quantity,
            unit_price,
            line_total: unit_price * f64::from(line.quantity),
            available: product.total_available,
        });
    }

    let subtotal = priced.iter().map(|line| line.line_total).sum();
    Ok(CartView {
        lines: priced,
        subtotal,
        price_tier: tier.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{aggregate, make_test_price, make_test_row, PriceList};
    use crate::database::{test_db, upsert_catalog};

    fn seeded_db() -> Connection {
        let mut conn = test_db();
        let rows = vec![
            make_test_row("TYR-001", "B-VDB", 8.0),
            make_test_row("TYR-002", "S-BFN", 2.0),
        ];
        let prices = PriceList::from_entries(vec![("TYR-001", make_test_price(1500.0, "Passenger"))]);
        let snapshot = aggregate(&rows, &prices);
        upsert_catalog(&mut conn, &snapshot.items).unwrap();
        conn
    }

    #[test]
    fn adding_same_sku_merges_quantity() {
        let carts = CartStore::new();
        carts.add(7, "TYR-001", 2);
        let lines = carts.add(7, "TYR-001", 3);
        assert_eq!(
            lines,
            vec![CartLine {
                sku: "TYR-001".to_string(),
                quantity: 5
            }]
        );
        assert!(carts.get(8).is_empty());
    }

    #[test]
    fn take_hands_lines_to_one_caller() {
        let carts = CartStore::new();
        carts.add(7, "TYR-001", 2);
        assert_eq!(carts.take(7).len(), 1);
        assert!(carts.take(7).is_empty());
        assert!(carts.get(7).is_empty());
    }

    #[test]
    fn restore_merges_with_lines_added_meanwhile() {
        let carts = CartStore::new();
        carts.add(7, "TYR-001", 2);
        let taken = carts.take(7);
        carts.add(7, "TYR-002", 1);
        carts.add(7, "TYR-001", 1);
        carts.restore(7, taken);

        let lines = carts.get(7);
        assert_eq!(lines[0].sku, "TYR-001");
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(lines[1].sku, "TYR-002");

        carts.restore(8, Vec::new());
        assert!(carts.get(8).is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let carts = CartStore::new();
        carts.add(7, "TYR-001", 1);
        carts.add(7, "TYR-002", 1);
        assert!(carts.remove(7, "TYR-001"));
        assert!(!carts.remove(7, "TYR-001"));
        assert_eq!(carts.get(7).len(), 1);

        carts.clear(7);
        assert!(carts.get(7).is_empty());
    }

    #[test]
    fn prices_at_customer_tier() {
        let conn = seeded_db();
        let lines = vec![CartLine {
            sku: "TYR-001".to_string(),
            quantity: 4,
        }];

        let list = price_cart(&conn, &lines, None).unwrap();
        assert_eq!(list.subtotal, 6000.0);

        let tier2 = price_cart(&conn, &lines, Some("Tier 2")).unwrap();
        assert_eq!(tier2.lines[0].unit_price, 1400.0);
        assert_eq!(tier2.subtotal, 5600.0);
        assert_eq!(tier2.lines[0].available, 8.0);

        let unknown_tier = price_cart(&conn, &lines, Some("Tier 9")).unwrap();
        assert_eq!(unknown_tier.subtotal, 6000.0);
    }

    #[test]
    fn unpriced_and_missing_skus() {
        let conn = seeded_db();
        let lines = vec![
            CartLine {
                sku: "TYR-002".to_string(),
                quantity: 1,
            },
            CartLine {
                sku: "GONE".to_string(),
                quantity: 1,
            },
        ];
        let view = price_cart(&conn, &lines, None).unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.subtotal, 0.0);

        let quote = view.quote_lines();
        assert_eq!(quote[0].sku, "TYR-002");
        assert_eq!(quote[0].quantity, 1.0);
    }
}
