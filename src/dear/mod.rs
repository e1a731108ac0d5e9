//! DEAR (Cin7 Core) ERP client
//!
//! Every list endpoint goes through [`DearClient::fetch_all`], which pages with
//! `Page`/`Limit`, decodes the response envelope and retries transient failures.

mod availability;
mod customers;
mod envelope;
mod locations;
mod products;
mod retry;
mod sale;

pub use availability::AvailabilityRow;
pub use customers::CustomerRecord;
pub use envelope::{decode_page, Page};
pub use locations::LocationRecord;
pub use products::{AttachedFile, ProductRecord};
pub use retry::RetryPolicy;
pub use sale::{QuoteLine, QuoteReceipt, QuoteRequest, UNAUTHORISED_ORDER_STATUS};

use crate::error::{PortalError, Result};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://inventory.dearsystems.com/ExternalApi/v2";

/// The ERP refuses pages larger than this
pub const MAX_PAGE_SIZE: u32 = 1000;

const ACCOUNT_HEADER: &str = "api-auth-accountid";
const KEY_HEADER: &str = "api-auth-applicationkey";
const USER_AGENT: &str = "tyre_portal/0.1";

/// Connection settings for the ERP
#[derive(Debug, Clone)]
pub struct DearConfig {
    pub base_url: String,
    pub account_id: String,
    pub application_key: String,
    pub page_size: u32,
    pub timeout: Duration,
}

impl DearConfig {
    pub fn new(account_id: impl Into<String>, application_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            account_id: account_id.into(),
            application_key: application_key.into(),
            page_size: MAX_PAGE_SIZE,
            timeout: Duration::from_secs(60),
        }
    }
}

/// DEAR API client
pub struct DearClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) account_id: String,
    pub(crate) application_key: String,
    pub(crate) page_size: u32,
    pub(crate) retry: RetryPolicy,
}

impl DearClient {
    /// Creates a client with the default retry policy (3 retries, 2s/4s/8s).
    pub fn new(config: DearConfig) -> Result<Self> {
        log::info!("Creating DEAR API client for {}", config.base_url);
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id,
            application_key: config.application_key,
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// One authenticated request, no retries
    async fn send_once(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut request = self
            .client
            .request(method.clone(), self.url(endpoint))
            .header(ACCOUNT_HEADER, &self.account_id)
            .header(KEY_HEADER, &self.application_key)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        log::debug!("{} {} -> {}", method, endpoint, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::HttpStatus {
                status,
                endpoint: endpoint.to_string(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// GET with retry on every transient failure
    pub(crate) async fn get_json(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
        self.retry
            .run(endpoint, PortalError::is_transient, || {
                self.send_once(Method::GET, endpoint, query, None)
            })
            .await
    }

    /// POST with retry only when the ERP refused to process the request.
    ///
    /// A 5xx or timeout after a POST may have created the record already, so
    /// only rate limiting is retried.
    pub(crate) async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.retry
            .run(endpoint, PortalError::is_rate_limited, || {
                self.send_once(Method::POST, endpoint, &[], Some(body))
            })
            .await
    }

    /// Page through a list endpoint until a short page (or `Total`) ends it.
    pub(crate) async fn fetch_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        list_property: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let limit = self.page_size;
        let mut items: Vec<T> = Vec::new();
        let mut page_number: u32 = 1;

        loop {
            let mut query: Vec<(&str, String)> = filters.to_vec();
            query.push(("Page", page_number.to_string()));
            query.push(("Limit", limit.to_string()));

            let value = self.get_json(endpoint, &query).await?;
            let page: Page<T> = decode_page(endpoint, list_property, value)?;
            let received = page.items.len();
            items.extend(page.items);

            log::debug!(
                "{} page {}: {} rows ({} so far)",
                endpoint,
                page_number,
                received,
                items.len()
            );

            let short_page = received < limit as usize;
            let reached_total = page.total.is_some_and(|total| items.len() as u64 >= total);
            if short_page || reached_total {
                break;
            }
            page_number += 1;
        }

        log::info!("Fetched {} rows from {}", items.len(), endpoint);
        Ok(items)
    }
}
