//! Per-location stock rows from `ref/productavailability`

use super::DearClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

const ENDPOINT: &str = "ref/productavailability";
const LIST_PROPERTY: &str = "ProductAvailabilityList";

/// Stock for one SKU at one ERP location
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AvailabilityRow {
    /// ERP product ID
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub location: String,
    #[serde(default)]
    pub on_hand: f64,
    #[serde(default)]
    pub allocated: f64,
    #[serde(default)]
    pub available: f64,
    #[serde(default)]
    pub on_order: f64,
}

impl DearClient {
    /// Fetch availability for each of `locations`, one paged sweep per location.
    pub async fn fetch_availability(&self, locations: &[&str]) -> Result<Vec<AvailabilityRow>> {
        let mut rows = Vec::new();
        for location in locations {
            log::info!("Fetching availability for location {}", location);
            let filter = [("Location", (*location).to_string())];
            let batch: Vec<AvailabilityRow> =
                self.fetch_all(ENDPOINT, LIST_PROPERTY, &filter).await?;
            rows.extend(batch);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_row_deserializes() {
        let json = r#"{
            "ID": "b3f1c1de-0000-4000-8000-000000000001",
            "SKU": "TYR-20555R16",
            "Name": "205/55R16 91V Touring",
            "Barcode": null,
            "Location": "B-VDB",
            "Bin": null,
            "OnHand": 12.0,
            "Allocated": 2.0,
            "Available": 10.0,
            "OnOrder": 40.0,
            "InTransit": 0
        }"#;

        let row: AvailabilityRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.sku, "TYR-20555R16");
        assert_eq!(row.location, "B-VDB");
        assert_eq!(row.available, 10.0);
        assert_eq!(row.on_order, 40.0);
        assert!(row.barcode.is_none());
    }

    #[test]
    fn missing_quantities_default_to_zero() {
        let json = r#"{"SKU": "X", "Location": "S-BFN"}"#;
        let row: AvailabilityRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.on_hand, 0.0);
        assert_eq!(row.available, 0.0);
        assert!(row.name.is_empty());
    }
}
