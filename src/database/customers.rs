//! ERP customers and the portal access flag

use super::{json_column, now_timestamp, to_json_text, DbResult};
use crate::dear::CustomerRecord;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CustomerRow {
    pub id: i64,
    pub erp_customer_id: String,
    pub name: String,
    pub status: Option<String>,
    pub currency: Option<String>,
    pub payment_term: Option<String>,
    pub price_tier: Option<String>,
    pub addresses: Value,
    pub contacts: Value,
    pub portal_access: bool,
    pub updated_at: String,
}

const CUSTOMER_COLUMNS: &str = "id, erp_customer_id, name, status, currency, payment_term, \
     price_tier, addresses, contacts, portal_access, updated_at";

fn customer_from_row(row: &Row<'_>) -> DbResult<CustomerRow> {
    Ok(CustomerRow {
        id: row.get(0)?,
        erp_customer_id: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        currency: row.get(4)?,
        payment_term: row.get(5)?,
        price_tier: row.get(6)?,
        addresses: json_column(row, 7)?,
        contacts: json_column(row, 8)?,
        portal_access: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Upsert customers by ERP ID. `portal_access` is never touched here.
///
/// Returns the number of rows inserted or changed.
pub fn upsert_customers(conn: &mut Connection, customers: &[CustomerRecord]) -> DbResult<usize> {
    let tx = conn.transaction()?;
    let now = now_timestamp();
    let mut changed = 0;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO customers
             (erp_customer_id, name, status, currency, payment_term, price_tier,
              addresses, contacts, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(erp_customer_id) DO UPDATE SET
                 name = excluded.name,
                 status = excluded.status,
                 currency = excluded.currency,
                 payment_term = excluded.payment_term,
                 price_tier = excluded.price_tier,
                 addresses = excluded.addresses,
                 contacts = excluded.contacts,
                 updated_at = excluded.updated_at
             WHERE customers.name IS NOT excluded.name
                OR customers.status IS NOT excluded.status
                OR customers.currency IS NOT excluded.currency
                OR customers.payment_term IS NOT excluded.payment_term
                OR customers.price_tier IS NOT excluded.price_tier
                OR customers.addresses IS NOT excluded.addresses
                OR customers.contacts IS NOT excluded.contacts",
        )?;

        for customer in customers {
            changed += stmt.execute(params![
                &customer.id,
                &customer.name,
                &customer.status,
                &customer.currency,
                &customer.payment_term,
                &customer.price_tier,
                to_json_text(&customer.addresses)?,
                to_json_text(&customer.contacts)?,
                &now,
            ])?;
        }
    }
    tx.commit()?;

    log::info!(
        "Upserted {} customers ({} changed)",
        customers.len(),
        changed
    );
    Ok(changed)
}

/// All customers, ordered by name
pub fn list_customers(conn: &Connection) -> DbResult<Vec<CustomerRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM customers ORDER BY name COLLATE NOCASE",
        CUSTOMER_COLUMNS
    ))?;
    let rows: DbResult<Vec<CustomerRow>> = stmt.query_map([], customer_from_row)?.collect();
    rows
}

pub fn get_customer(conn: &Connection, id: i64) -> DbResult<Option<CustomerRow>> {
    conn.query_row(
        &format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS),
        params![id],
        customer_from_row,
    )
    .optional()
}

/// Grant or revoke portal access. Returns false if the customer does not exist.
pub fn set_portal_access(conn: &Connection, id: i64, enabled: bool) -> DbResult<bool> {
    let updated = conn.execute(
        "UPDATE customers SET portal_access = ?2 WHERE id = ?1",
        params![id, enabled],
    )?;
    if updated > 0 {
        log::info!("Portal access for customer {} set to {}", id, enabled);
    }
    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;

    fn by_erp_id(conn: &Connection, erp_id: &str) -> CustomerRow {
        list_customers(conn)
            .unwrap()
            .into_iter()
            .find(|c| c.erp_customer_id == erp_id)
            .unwrap()
    }

    fn record(id: &str, name: &str, tier: &str) -> CustomerRecord {
        serde_json::from_value(serde_json::json!({
            "ID": id,
            "Name": name,
            "Status": "Active",
            "Currency": "ZAR",
            "PaymentTerm": "30 days",
            "PriceTier": tier,
            "Addresses": [{"Line1": "1 Main Rd"}],
            "Contacts": []
        }))
        .unwrap()
    }

    #[test]
    fn upsert_inserts_customers_without_access() {
        let mut conn = test_db();
        let changed =
            upsert_customers(&mut conn, &[record("c-1", "Rand Tyres", "Tier 2")]).unwrap();
        assert_eq!(changed, 1);

        let customer = by_erp_id(&conn, "c-1");
        assert_eq!(customer.name, "Rand Tyres");
        assert_eq!(customer.price_tier.as_deref(), Some("Tier 2"));
        assert_eq!(customer.addresses[0]["Line1"], "1 Main Rd");
        assert!(!customer.portal_access);
    }

    #[test]
    fn resync_preserves_portal_access() {
        let mut conn = test_db();
        upsert_customers(&mut conn, &[record("c-1", "Rand Tyres", "Tier 2")]).unwrap();
        let id = by_erp_id(&conn, "c-1").id;
        assert!(set_portal_access(&conn, id, true).unwrap());

        upsert_customers(&mut conn, &[record("c-1", "Rand Tyres (Pty) Ltd", "Tier 3")]).unwrap();

        let customer = get_customer(&conn, id).unwrap().unwrap();
        assert!(customer.portal_access);
        assert_eq!(customer.name, "Rand Tyres (Pty) Ltd");
        assert_eq!(customer.price_tier.as_deref(), Some("Tier 3"));
    }

    #[test]
    fn identical_resync_changes_nothing() {
        let mut conn = test_db();
        let customers = [record("c-1", "A", "Tier 1"), record("c-2", "B", "Tier 1")];
        upsert_customers(&mut conn, &customers).unwrap();
        let before = list_customers(&conn).unwrap();

        assert_eq!(upsert_customers(&mut conn, &customers).unwrap(), 0);
        assert_eq!(list_customers(&conn).unwrap(), before);
    }

    #[test]
    fn set_portal_access_on_missing_customer() {
        let conn = test_db();
        assert!(!set_portal_access(&conn, 42, true).unwrap());
    }
}
