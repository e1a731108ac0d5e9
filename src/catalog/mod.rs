//! Catalog aggregation: ERP stock rows + price list → customer-facing catalog

mod aggregate;
mod pricing;
mod regions;

pub use aggregate::{aggregate, CatalogItem, CatalogSnapshot, StockLevels};
pub use pricing::{PriceEntry, PriceList, DEFAULT_CATEGORY};
pub use regions::{Region, ALLOWED_WAREHOUSES};

#[cfg(test)]
pub use aggregate::make_test_row;
#[cfg(test)]
pub use pricing::make_test_price;
