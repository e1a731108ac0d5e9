//! ERP locations from `ref/location`

use super::DearClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

const ENDPOINT: &str = "ref/location";
const LIST_PROPERTY: &str = "LocationList";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LocationRecord {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub deprecated: bool,
}

impl DearClient {
    pub async fn fetch_locations(&self) -> Result<Vec<LocationRecord>> {
        self.fetch_all(ENDPOINT, LIST_PROPERTY, &[]).await
    }
}
