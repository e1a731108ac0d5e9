//! SKU-keyed price list built from the product master feed

use crate::dear::ProductRecord;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Category used for SKUs the product feed does not know
pub const DEFAULT_CATEGORY: &str = "Uncategorised";

/// Pricing and descriptive metadata for one SKU
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEntry {
    pub erp_id: Option<String>,
    pub name: String,
    /// List price (tier 1)
    pub price: f64,
    pub price_tiers: BTreeMap<String, f64>,
    pub category: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub image_url: Option<String>,
}

impl PriceEntry {
    /// Price for a customer's tier, falling back to the list price
    pub fn price_for_tier(&self, tier: Option<&str>) -> f64 {
        tier.and_then(|t| self.price_tiers.get(t))
            .copied()
            .unwrap_or(self.price)
    }
}

impl From<ProductRecord> for PriceEntry {
    fn from(product: ProductRecord) -> Self {
        let price = product.base_price().unwrap_or(0.0);
        let price_tiers = product.price_tiers();
        let image_url = product.image_url().map(str::to_string);
        let category = product
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Self {
            erp_id: product.id,
            name: product.name,
            price,
            price_tiers,
            category,
            brand: product.brand.filter(|b| !b.trim().is_empty()),
            barcode: product.barcode.filter(|b| !b.trim().is_empty()),
            image_url,
        }
    }
}

/// Price lookup by SKU
#[derive(Debug, Default)]
pub struct PriceList {
    entries: HashMap<String, PriceEntry>,
}

impl PriceList {
    /// Build from the product feed; later duplicates of a SKU win
    pub fn from_products(products: Vec<ProductRecord>) -> Self {
        let entries = products
            .into_iter()
            .map(|p| (p.sku.clone(), PriceEntry::from(p)))
            .collect();
        Self { entries }
    }

    /// Look up pricing for a SKU
    pub fn get(&self, sku: &str) -> Option<&PriceEntry> {
        self.entries.get(sku)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create a PriceList from entries (for testing)
    #[cfg(test)]
    pub fn from_entries(entries: Vec<(&str, PriceEntry)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(sku, e)| (sku.to_string(), e))
            .collect();
        Self { entries }
    }
}

#[cfg(test)]
pub use tests::make_test_price;

#[cfg(test)]
mod tests {
    use super::*;

    /// Price entry with a list price and a tier 2 price 100 below it
    pub fn make_test_price(price: f64, category: &str) -> PriceEntry {
        let mut price_tiers = BTreeMap::new();
        price_tiers.insert("Tier 1".to_string(), price);
        price_tiers.insert("Tier 2".to_string(), price - 100.0);
        PriceEntry {
            erp_id: None,
            name: String::new(),
            price,
            price_tiers,
            category: category.to_string(),
            brand: Some("Roadmaster".to_string()),
            barcode: None,
            image_url: None,
        }
    }

    fn product(json: &str) -> ProductRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn entry_from_product_record() {
        let entry = PriceEntry::from(product(
            r#"{"ID": "p-1", "SKU": "A", "Name": "Tyre A", "Category": "SUV",
                "Brand": "Roadmaster", "PriceTier1": 1200.0, "PriceTier3": 999.0}"#,
        ));
        assert_eq!(entry.price, 1200.0);
        assert_eq!(entry.category, "SUV");
        assert_eq!(entry.price_for_tier(Some("Tier 3")), 999.0);
        assert_eq!(entry.erp_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn unknown_tier_falls_back_to_list_price() {
        let entry = make_test_price(1000.0, "Passenger");
        assert_eq!(entry.price_for_tier(Some("Tier 7")), 1000.0);
        assert_eq!(entry.price_for_tier(None), 1000.0);
        assert_eq!(entry.price_for_tier(Some("Tier 2")), 900.0);
    }

    #[test]
    fn blank_category_becomes_default() {
        let entry = PriceEntry::from(product(r#"{"SKU": "B", "Category": "  "}"#));
        assert_eq!(entry.category, DEFAULT_CATEGORY);
        assert_eq!(entry.price, 0.0);
    }

    #[test]
    fn price_list_lookup() {
        let list = PriceList::from_products(vec![
            product(r#"{"SKU": "A", "PriceTier1": 1.0}"#),
            product(r#"{"SKU": "B", "PriceTier1": 2.0}"#),
        ]);
        assert_eq!(list.len(), 2);
        assert!(!list.is_empty());
        assert_eq!(list.get("B").unwrap().price, 2.0);
        assert!(list.get("C").is_none());
        assert!(PriceList::from_products(Vec::new()).is_empty());
    }
}
