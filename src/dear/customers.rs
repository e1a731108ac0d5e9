//! ERP customers from `customer`

use super::DearClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ENDPOINT: &str = "customer";
const LIST_PROPERTY: &str = "CustomerList";

/// ERP customer. Addresses and contacts are kept as raw JSON.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_term: Option<String>,
    #[serde(default)]
    pub price_tier: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Value>,
    #[serde(default)]
    pub contacts: Vec<Value>,
}

impl DearClient {
    pub async fn fetch_customers(&self) -> Result<Vec<CustomerRecord>> {
        self.fetch_all(ENDPOINT, LIST_PROPERTY, &[]).await
    }
}
