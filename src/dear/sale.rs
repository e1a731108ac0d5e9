//! Quote submission: a sale header plus an unauthorised sale order

use super::DearClient;
use crate::error::{PortalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Order status the ERP treats as "awaiting approval"
pub const UNAUTHORISED_ORDER_STATUS: &str = "DRAFT";

/// One line of a quote, priced at the customer's tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteLine {
    /// ERP product ID when known
    pub product_id: Option<String>,
    pub sku: String,
    pub name: String,
    pub quantity: f64,
    pub price: f64,
}

impl QuoteLine {
    pub fn total(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Everything needed to raise a quote in the ERP
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteRequest {
    pub customer_id: String,
    pub customer_name: String,
    /// ERP location code the order is raised against
    pub location: String,
    pub price_tier: Option<String>,
    pub reference: Option<String>,
    pub note: Option<String>,
    /// `YYYY-MM-DD`
    pub order_date: String,
    pub lines: Vec<QuoteLine>,
}

/// What the ERP returned for a submitted quote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteReceipt {
    pub sale_id: String,
    pub status: String,
}

impl QuoteRequest {
    fn sale_body(&self) -> Value {
        json!({
            "CustomerID": self.customer_id,
            "Customer": self.customer_name,
            "Location": self.location,
            "PriceTier": self.price_tier,
            "CustomerReference": self.reference,
            "Note": self.note,
            "SaleOrderDate": self.order_date,
            "SkipQuote": true,
        })
    }

    fn order_body(&self, sale_id: &str) -> Value {
        let lines: Vec<Value> = self
            .lines
            .iter()
            .map(|line| {
                json!({
                    "ProductID": line.product_id,
                    "SKU": line.sku,
                    "Name": line.name,
                    "Quantity": line.quantity,
                    "Price": line.price,
                    "Tax": 0,
                    "Total": line.total(),
                })
            })
            .collect();

        json!({
            "SaleID": sale_id,
            "Status": UNAUTHORISED_ORDER_STATUS,
            "Memo": self.note,
            "Lines": lines,
        })
    }
}

impl DearClient {
    /// Create the sale header, then attach the lines as a `DRAFT` order.
    pub async fn create_quote(&self, request: &QuoteRequest) -> Result<QuoteReceipt> {
        if request.lines.is_empty() {
            return Err(PortalError::Erp("quote has no lines".to_string()));
        }

        log::info!(
            "Creating quote for customer {} at {} ({} lines)",
            request.customer_name,
            request.location,
            request.lines.len()
        );

        let sale = self.post_json("sale", &request.sale_body()).await?;
        let sale_id = sale
            .get("ID")
            .and_then(Value::as_str)
            .ok_or_else(|| PortalError::Erp("sale response has no ID".to_string()))?
            .to_string();
        log::debug!("Created sale {}", sale_id);

        let order = self
            .post_json("sale/order", &request.order_body(&sale_id))
            .await?;
        let status = order
            .get("Status")
            .and_then(Value::as_str)
            .unwrap_or(UNAUTHORISED_ORDER_STATUS)
            .to_string();

        log::info!("Quote submitted as sale {} ({})", sale_id, status);
        Ok(QuoteReceipt { sale_id, status })
    }
}
