//! Tyre Portal - B2B storefront over a DEAR/Cin7 inventory mirror
//!
//! Mirrors ERP locations, stock, pricing and customers into SQLite on a
//! schedule, and serves a JSON API where approved wholesale customers browse
//! regional stock, keep a cart and submit quotes back to the ERP.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod database;
pub mod dear;
pub mod error;
pub mod scheduler;
pub mod sync;
pub mod web;

pub use catalog::{aggregate, CatalogItem, Region, ALLOWED_WAREHOUSES};
pub use database::{init_schema, SharedDb};
pub use dear::{DearClient, DearConfig, RetryPolicy};
pub use error::{PortalError, Result};
pub use scheduler::{Scheduler, SyncKind};
