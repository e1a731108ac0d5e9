//! SQLite cache for ERP data plus portal users, sessions and quotes
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Sync writes are transactional and idempotent: an upsert only touches a row
//! (and its `updated_at`) when a value actually changed.

mod catalog;
mod customers;
mod quotes;
mod users;

pub use catalog::{
    get_product, list_availability, list_products, list_warehouses, upsert_catalog,
    upsert_warehouses, AvailabilityRecord, CatalogUpsert, ProductFilter, ProductPage,
    ProductSummary, WarehouseRow,
};
pub use customers::{
    get_customer, list_customers, set_portal_access, upsert_customers,
    CustomerRow,
};
pub use quotes::{insert_quote, list_quotes, NewQuote, QuoteRow};
pub use users::{
    create_user, delete_session, find_credentials, get_user, insert_session, list_users,
    purge_expired_sessions, session_user, NewUser, Role, UserRow,
};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// The single connection shared by the scheduler and the web server
pub type SharedDb = Arc<Mutex<Connection>>;

/// Lock the shared connection. Never hold the guard across an `.await`.
pub fn lock(db: &SharedDb) -> MutexGuard<'_, Connection> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Open (or create) the database file and initialise the schema
pub fn open(path: &Path) -> DbResult<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    log::info!("Opened database: {}", path.display());
    Ok(conn)
}

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `warehouses`: customer-facing regions and the ERP locations behind them
/// - `products`: one row per SKU with pricing metadata
/// - `availability`: stock per (product, warehouse)
/// - `customers`: ERP customers plus the admin-controlled portal flag
/// - `users`, `sessions`: portal logins
/// - `quotes`: append-only log of submitted carts
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS warehouses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            locations TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sku TEXT NOT NULL UNIQUE,
            erp_id TEXT,
            name TEXT NOT NULL,
            brand TEXT,
            barcode TEXT,
            category TEXT NOT NULL,
            image_url TEXT,
            price REAL NOT NULL DEFAULT 0,
            price_tiers TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand);
        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);

        -- One row per product per region, rewritten on every catalog sync
        CREATE TABLE IF NOT EXISTS availability (
            product_id INTEGER NOT NULL,
            warehouse_id INTEGER NOT NULL,
            on_hand REAL NOT NULL DEFAULT 0,
            allocated REAL NOT NULL DEFAULT 0,
            available REAL NOT NULL DEFAULT 0,
            on_order REAL NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (product_id, warehouse_id),
            FOREIGN KEY (product_id) REFERENCES products(id),
            FOREIGN KEY (warehouse_id) REFERENCES warehouses(id)
        );

        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            erp_customer_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            status TEXT,
            currency TEXT,
            payment_term TEXT,
            price_tier TEXT,
            addresses TEXT NOT NULL DEFAULT '[]',
            contacts TEXT NOT NULL DEFAULT '[]',
            portal_access INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('admin', 'customer')),
            customer_id INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (customer_id) REFERENCES customers(id)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

        CREATE TABLE IF NOT EXISTS quotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            customer_id INTEGER NOT NULL,
            sale_id TEXT NOT NULL,
            status TEXT NOT NULL,
            region TEXT NOT NULL,
            total REAL NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (customer_id) REFERENCES customers(id)
        );

        CREATE INDEX IF NOT EXISTS idx_quotes_customer ON quotes(customer_id);
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// Timestamp format used in every `*_at` column; sorts lexicographically
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Read a TEXT column holding JSON
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> DbResult<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Serialize a value for a JSON TEXT column
pub(crate) fn to_json_text<T: serde::Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Row counts for the status endpoint
pub fn table_count(conn: &Connection, table: CountedTable) -> DbResult<i64> {
    let sql = match table {
        CountedTable::Products => "SELECT COUNT(*) FROM products",
        CountedTable::Customers => "SELECT COUNT(*) FROM customers",
        CountedTable::Quotes => "SELECT COUNT(*) FROM quotes",
        CountedTable::Users => "SELECT COUNT(*) FROM users",
    };
    conn.query_row(sql, [], |row| row.get(0))
}

/// Tables whose size is reported
#[derive(Debug, Clone, Copy)]
pub enum CountedTable {
    Products,
    Customers,
    Quotes,
    Users,
}

#[cfg(test)]
pub(crate) fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_schema_creates_tables() {
        let conn = test_db();
        for table in [
            "warehouses",
            "products",
            "availability",
            "customers",
            "users",
            "sessions",
            "quotes",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn init_schema_is_repeatable() {
        let conn = test_db();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn open_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("portal.db");
        let conn = open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(table_count(&conn, CountedTable::Products).unwrap(), 0);
    }

    #[test]
    fn timestamps_sort_chronologically() {
        use chrono::TimeZone;
        let earlier = timestamp(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap());
        let later = timestamp(Utc.with_ymd_and_hms(2026, 10, 16, 8, 30, 0).unwrap());
        assert_eq!(earlier, "2026-02-01T09:00:00Z");
        assert!(earlier < later);
    }
}
