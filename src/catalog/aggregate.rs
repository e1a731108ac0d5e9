//! Group per-location availability rows into regional stock per SKU

use super::pricing::{PriceList, DEFAULT_CATEGORY};
use super::regions::Region;
use crate::dear::AvailabilityRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Quantities for one SKU in one region (or across all regions)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StockLevels {
    pub on_hand: f64,
    pub allocated: f64,
    pub available: f64,
    pub on_order: f64,
}

impl StockLevels {
    fn add(&mut self, row: &AvailabilityRow) {
        self.on_hand += row.on_hand;
        self.allocated += row.allocated;
        self.available += row.available;
        self.on_order += row.on_order;
    }
}

/// One SKU as the portal shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub sku: String,
    pub erp_id: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub category: String,
    pub image_url: Option<String>,
    pub price: f64,
    pub price_tiers: BTreeMap<String, f64>,
    /// Always holds every region, zeroed where the SKU has no stock
    pub regions: BTreeMap<Region, StockLevels>,
    /// Sum over mapped locations only
    pub total: StockLevels,
}

impl CatalogItem {
    fn new(row: &AvailabilityRow) -> Self {
        Self {
            sku: row.sku.clone(),
            erp_id: row.id.clone(),
            name: row.name.clone(),
            brand: None,
            barcode: row.barcode.clone().filter(|b| !b.is_empty()),
            category: DEFAULT_CATEGORY.to_string(),
            image_url: None,
            price: 0.0,
            price_tiers: BTreeMap::new(),
            regions: Region::ALL
                .into_iter()
                .map(|r| (r, StockLevels::default()))
                .collect(),
            total: StockLevels::default(),
        }
    }

    pub fn region(&self, region: Region) -> StockLevels {
        self.regions.get(&region).copied().unwrap_or_default()
    }
}

/// Output of one aggregation pass
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    /// Sorted by SKU
    pub items: Vec<CatalogItem>,
    /// Rows whose location is not mapped to a region
    pub unmapped_rows: usize,
    /// SKUs with no entry in the price list
    pub unpriced_skus: usize,
}

/// Group rows by SKU, sum them into regions and join the price list.
///
/// Rows from unmapped locations are skipped entirely. A SKU missing from the
/// price list keeps price 0 and the default category.
pub fn aggregate(rows: &[AvailabilityRow], prices: &PriceList) -> CatalogSnapshot {
    let mut by_sku: BTreeMap<&str, CatalogItem> = BTreeMap::new();
    let mut unmapped_rows = 0;

    for row in rows {
        let Some(region) = Region::for_location(&row.location) else {
            log::debug!("Skipping {} at unmapped location {}", row.sku, row.location);
            unmapped_rows += 1;
            continue;
        };

        let item = by_sku
            .entry(row.sku.as_str())
            .or_insert_with(|| CatalogItem::new(row));
        if item.name.is_empty() && !row.name.is_empty() {
            item.name = row.name.clone();
        }
        if item.erp_id.is_none() {
            item.erp_id = row.id.clone();
        }
        item.regions.entry(region).or_default().add(row);
        item.total.add(row);
    }

    let mut unpriced_skus = 0;
    let items = by_sku
        .into_values()
        .map(|mut item| {
            match prices.get(&item.sku) {
                Some(entry) => {
                    item.price = entry.price;
                    item.price_tiers = entry.price_tiers.clone();
                    item.category = entry.category.clone();
                    item.brand = entry.brand.clone();
                    item.image_url = entry.image_url.clone();
                    if entry.barcode.is_some() {
                        item.barcode = entry.barcode.clone();
                    }
                    if item.name.is_empty() {
                        item.name = entry.name.clone();
                    }
                    if item.erp_id.is_none() {
                        item.erp_id = entry.erp_id.clone();
                    }
                }
                None => unpriced_skus += 1,
            }
            item
        })
        .collect();

    CatalogSnapshot {
        items,
        unmapped_rows,
        unpriced_skus,
    }
}

#[cfg(test)]
pub use tests::make_test_row;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::pricing::make_test_price;
    use crate::catalog::ALLOWED_WAREHOUSES;

    /// Availability row with only `available` and `on_hand` set
    pub fn make_test_row(sku: &str, location: &str, available: f64) -> AvailabilityRow {
        AvailabilityRow {
            id: None,
            sku: sku.to_string(),
            name: format!("Tyre {}", sku),
            barcode: None,
            location: location.to_string(),
            on_hand: available,
            allocated: 0.0,
            available,
            on_order: 0.0,
        }
    }

    #[test]
    fn b_vdb_stock_lands_in_jhb_only() {
        let rows = vec![make_test_row("A", "B-VDB", 10.0)];
        let snapshot = aggregate(&rows, &PriceList::default());
        let item = &snapshot.items[0];

        assert_eq!(item.region(Region::Jhb).available, 10.0);
        assert_eq!(item.region(Region::Cpt).available, 0.0);
        assert_eq!(item.region(Region::Bfn).available, 0.0);
        assert_eq!(item.total.available, 10.0);
    }

    #[test]
    fn locations_in_same_region_are_summed() {
        let rows = vec![
            make_test_row("A", "B-VDB", 10.0),
            make_test_row("A", "S-POM", 5.0),
            make_test_row("A", "B-CPT", 3.0),
            make_test_row("A", "S-CPT", 1.0),
            make_test_row("A", "S-BFN", 2.0),
        ];
        let snapshot = aggregate(&rows, &PriceList::default());
        let item = &snapshot.items[0];

        assert_eq!(item.region(Region::Jhb).available, 15.0);
        assert_eq!(item.region(Region::Cpt).available, 4.0);
        assert_eq!(item.region(Region::Bfn).available, 2.0);
        assert_eq!(item.total.available, 21.0);
    }

    #[test]
    fn unmapped_locations_contribute_nothing() {
        let rows = vec![
            make_test_row("A", "B-VDB", 10.0),
            make_test_row("A", "B-DBN", 50.0),
            make_test_row("B", "QUARANTINE", 7.0),
        ];
        let snapshot = aggregate(&rows, &PriceList::default());

        assert_eq!(snapshot.unmapped_rows, 2);
        assert_eq!(snapshot.items.len(), 1);
        let item = &snapshot.items[0];
        assert_eq!(item.total.available, 10.0);
        let regional: f64 = Region::ALL.iter().map(|r| item.region(*r).available).sum();
        assert_eq!(regional, 10.0);
    }

    #[test]
    fn every_allowed_warehouse_reaches_some_region() {
        let rows: Vec<_> = ALLOWED_WAREHOUSES
            .iter()
            .map(|loc| make_test_row("A", loc, 1.0))
            .collect();
        let snapshot = aggregate(&rows, &PriceList::default());
        assert_eq!(snapshot.unmapped_rows, 0);
        assert_eq!(snapshot.items[0].total.available, 5.0);
    }

    #[test]
    fn every_item_carries_all_regions() {
        let rows = vec![make_test_row("A", "S-BFN", 4.0)];
        let snapshot = aggregate(&rows, &PriceList::default());
        assert_eq!(snapshot.items[0].regions.len(), Region::ALL.len());
    }

    #[test]
    fn all_quantity_fields_are_accumulated() {
        let mut row = make_test_row("A", "B-CPT", 6.0);
        row.on_hand = 8.0;
        row.allocated = 2.0;
        row.on_order = 20.0;
        let snapshot = aggregate(&[row.clone(), row], &PriceList::default());
        let cpt = snapshot.items[0].region(Region::Cpt);

        assert_eq!(
            cpt,
            StockLevels {
                on_hand: 16.0,
                allocated: 4.0,
                available: 12.0,
                on_order: 40.0,
            }
        );
    }

    #[test]
    fn missing_price_defaults_to_zero_and_default_category() {
        let rows = vec![make_test_row("A", "B-VDB", 1.0), make_test_row("B", "B-VDB", 1.0)];
        let prices = PriceList::from_entries(vec![("A", make_test_price(1500.0, "SUV"))]);
        let snapshot = aggregate(&rows, &prices);

        assert_eq!(snapshot.unpriced_skus, 1);
        let a = &snapshot.items[0];
        let b = &snapshot.items[1];
        assert_eq!(a.price, 1500.0);
        assert_eq!(a.category, "SUV");
        assert_eq!(a.brand.as_deref(), Some("Roadmaster"));
        assert_eq!(b.price, 0.0);
        assert_eq!(b.category, DEFAULT_CATEGORY);
        assert!(b.price_tiers.is_empty());
    }

    #[test]
    fn output_is_sorted_by_sku() {
        let rows = vec![
            make_test_row("C", "B-VDB", 1.0),
            make_test_row("A", "B-VDB", 1.0),
            make_test_row("B", "B-VDB", 1.0),
        ];
        let skus: Vec<String> = aggregate(&rows, &PriceList::default())
            .items
            .into_iter()
            .map(|i| i.sku)
            .collect();
        assert_eq!(skus, vec!["A", "B", "C"]);
    }

    #[test]
    fn same_input_gives_same_output() {
        let rows = vec![
            make_test_row("A", "B-VDB", 3.0),
            make_test_row("B", "S-CPT", 4.0),
        ];
        let prices = PriceList::from_entries(vec![("B", make_test_price(800.0, "LT"))]);
        assert_eq!(aggregate(&rows, &prices).items, aggregate(&rows, &prices).items);
    }
}
