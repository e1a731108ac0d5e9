//! Append-only log of quotes submitted to the ERP

use super::{json_column, now_timestamp, to_json_text, DbResult};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use serde_json::Value;

/// A quote to record after the ERP accepted it
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub user_id: i64,
    pub customer_id: i64,
    pub sale_id: String,
    pub status: String,
    pub region: String,
    pub total: f64,
    /// Snapshot of the submitted cart
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuoteRow {
    pub id: i64,
    pub user_id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub sale_id: String,
    pub status: String,
    pub region: String,
    pub total: f64,
    pub payload: Value,
    pub created_at: String,
}

const QUOTE_SELECT: &str = "SELECT q.id, q.user_id, q.customer_id, c.name, q.sale_id, q.status,
            q.region, q.total, q.payload, q.created_at
     FROM quotes q JOIN customers c ON c.id = q.customer_id";

fn quote_from_row(row: &Row<'_>) -> DbResult<QuoteRow> {
    Ok(QuoteRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        customer_id: row.get(2)?,
        customer_name: row.get(3)?,
        sale_id: row.get(4)?,
        status: row.get(5)?,
        region: row.get(6)?,
        total: row.get(7)?,
        payload: json_column(row, 8)?,
        created_at: row.get(9)?,
    })
}

pub fn insert_quote(conn: &Connection, quote: &NewQuote) -> DbResult<QuoteRow> {
    conn.execute(
        "INSERT INTO quotes
         (user_id, customer_id, sale_id, status, region, total, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            quote.user_id,
            quote.customer_id,
            &quote.sale_id,
            &quote.status,
            &quote.region,
            quote.total,
            to_json_text(&quote.payload)?,
            now_timestamp()
        ],
    )?;
    let id = conn.last_insert_rowid();

    conn.query_row(
        &format!("{} WHERE q.id = ?1", QUOTE_SELECT),
        params![id],
        quote_from_row,
    )
}

/// Quotes newest first, optionally only one customer's
pub fn list_quotes(conn: &Connection, customer_id: Option<i64>) -> DbResult<Vec<QuoteRow>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE (?1 IS NULL OR q.customer_id = ?1) ORDER BY q.id DESC",
        QUOTE_SELECT
    ))?;
    let rows: DbResult<Vec<QuoteRow>> = stmt.query_map(params![customer_id], quote_from_row)?.collect();
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_user, test_db, NewUser, Role};
    use serde_json::json;

    fn seed(conn: &Connection) -> (i64, i64, i64) {
        conn.execute_batch(
            "INSERT INTO customers (erp_customer_id, name, updated_at)
             VALUES ('c-1', 'Rand Tyres', '2026-10-16T00:00:00Z'),
                    ('c-2', 'Karoo Wheels', '2026-10-16T00:00:00Z');",
        )
        .unwrap();
        let user = create_user(
            conn,
            &NewUser {
                email: "buyer@rand.co.za".to_string(),
                password_hash: "x".to_string(),
                role: Role::Customer,
                customer_id: Some(1),
            },
        )
        .unwrap();
        (user.id, 1, 2)
    }

    fn quote(user_id: i64, customer_id: i64, sale_id: &str) -> NewQuote {
        NewQuote {
            user_id,
            customer_id,
            sale_id: sale_id.to_string(),
            status: "DRAFT".to_string(),
            region: "JHB".to_string(),
            total: 3000.0,
            payload: json!({"lines": [{"sku": "TYR-001", "quantity": 2}]}),
        }
    }

    #[test]
    fn insert_returns_row_with_customer_name() {
        let conn = test_db();
        let (user, rand, _) = seed(&conn);
        let row = insert_quote(&conn, &quote(user, rand, "sale-1")).unwrap();
        assert_eq!(row.customer_name, "Rand Tyres");
        assert_eq!(row.payload["lines"][0]["sku"], "TYR-001");
    }

    #[test]
    fn list_filters_by_customer_newest_first() {
        let conn = test_db();
        let (user, rand, karoo) = seed(&conn);
        insert_quote(&conn, &quote(user, rand, "sale-1")).unwrap();
        insert_quote(&conn, &quote(user, karoo, "sale-2")).unwrap();
        insert_quote(&conn, &quote(user, rand, "sale-3")).unwrap();

        let all = list_quotes(&conn, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].sale_id, "sale-3");

        let own: Vec<String> = list_quotes(&conn, Some(rand))
            .unwrap()
            .into_iter()
            .map(|q| q.sale_id)
            .collect();
        assert_eq!(own, vec!["sale-3", "sale-1"]);
    }
}
