//! Product master feed from `product`, used for pricing and category metadata

use super::DearClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

const ENDPOINT: &str = "product";
const LIST_PROPERTY: &str = "Products";

/// Prefix of the flat price columns (`PriceTier1` .. `PriceTier10`)
const PRICE_TIER_PREFIX: &str = "PriceTier";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AttachedFile {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(rename = "DownloadUrl", default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Product master record
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ProductRecord {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub attached_files: Vec<AttachedFile>,
    /// Remaining fields, including the flat `PriceTierN` columns
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ProductRecord {
    /// Prices keyed by tier name (`"Tier 1"` .. `"Tier 10"`)
    pub fn price_tiers(&self) -> BTreeMap<String, f64> {
        self.extra
            .iter()
            .filter_map(|(key, value)| {
                let number = key.strip_prefix(PRICE_TIER_PREFIX)?;
                let number: u8 = number.parse().ok()?;
                Some((format!("Tier {}", number), value.as_f64()?))
            })
            .collect()
    }

    /// Tier 1 is the list price
    pub fn base_price(&self) -> Option<f64> {
        self.price_tiers().get("Tier 1").copied()
    }

    /// Default attachment URL, else the first image attachment
    pub fn image_url(&self) -> Option<&str> {
        let is_image = |file: &&AttachedFile| {
            file.content_type
                .as_deref()
                .map_or(true, |ct| ct.starts_with("image/"))
        };
        self.attached_files
            .iter()
            .filter(is_image)
            .find(|file| file.is_default)
            .or_else(|| self.attached_files.iter().find(is_image))
            .and_then(|file| file.download_url.as_deref())
    }
}

impl DearClient {
    pub async fn fetch_products(&self) -> Result<Vec<ProductRecord>> {
        self.fetch_all(ENDPOINT, LIST_PROPERTY, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProductRecord {
        serde_json::from_str(
            r#"{
                "ID": "p-1",
                "SKU": "TYR-20555R16",
                "Name": "205/55R16 91V Touring",
                "Category": "Passenger",
                "Brand": "Roadmaster",
                "Barcode": "6001234567890",
                "PriceTier1": 1450.0,
                "PriceTier2": 1380.5,
                "PriceTier10": 0,
                "UOM": "Item",
                "AttachedFiles": [
                    {"ContentType": "application/pdf", "DownloadUrl": "https://cdn/spec.pdf", "IsDefault": true},
                    {"ContentType": "image/jpeg", "DownloadUrl": "https://cdn/tyre.jpg", "IsDefault": false}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn price_tiers_are_collected_from_flat_columns() {
        let product = sample();
        let tiers = product.price_tiers();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers.get("Tier 2"), Some(&1380.5));
        assert_eq!(tiers.get("Tier 10"), Some(&0.0));
        assert_eq!(product.base_price(), Some(1450.0));
    }

    #[test]
    fn image_url_skips_non_images() {
        assert_eq!(sample().image_url(), Some("https://cdn/tyre.jpg"));
    }

    #[test]
    fn product_without_prices_or_files() {
        let product: ProductRecord =
            serde_json::from_str(r#"{"SKU": "BARE", "Name": "Bare"}"#).unwrap();
        assert!(product.price_tiers().is_empty());
        assert_eq!(product.base_price(), None);
        assert_eq!(product.image_url(), None);
    }
}
