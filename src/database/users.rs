//! Portal users and login sessions

use super::{now_timestamp, DbResult};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A portal login (never carries the password hash)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub customer_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub customer_id: Option<i64>,
}

const USER_COLUMNS: &str = "u.id, u.email, u.role, u.customer_id, u.created_at";

fn user_from_row(row: &Row<'_>) -> DbResult<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        role: row.get(2)?,
        customer_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Insert a user; fails with a constraint error if the email is taken
pub fn create_user(conn: &Connection, user: &NewUser) -> DbResult<UserRow> {
    conn.execute(
        "INSERT INTO users (email, password_hash, role, customer_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.email.trim(),
            &user.password_hash,
            user.role,
            user.customer_id,
            now_timestamp()
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("Created {} user {} ({})", user.role.as_str(), user.email, id);

    get_user(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn get_user(conn: &Connection, id: i64) -> DbResult<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS),
        params![id],
        user_from_row,
    )
    .optional()
}

/// User and stored password hash for a login attempt (email is case-insensitive)
pub fn find_credentials(conn: &Connection, email: &str) -> DbResult<Option<(UserRow, String)>> {
    conn.query_row(
        &format!(
            "SELECT {}, u.password_hash FROM users u WHERE u.email = ?1",
            USER_COLUMNS
        ),
        params![email.trim()],
        |row| Ok((user_from_row(row)?, row.get(5)?)),
    )
    .optional()
}

pub fn list_users(conn: &Connection) -> DbResult<Vec<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users u ORDER BY u.email",
        USER_COLUMNS
    ))?;
    let rows: DbResult<Vec<UserRow>> = stmt.query_map([], user_from_row)?.collect();
    rows
}

// ── Sessions ───────────────────────────────────────────────────────────────

pub fn insert_session(conn: &Connection, token: &str, user_id: i64, expires_at: &str) -> DbResult<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, user_id, now_timestamp(), expires_at],
    )?;
    Ok(())
}

/// The user behind an unexpired session token
pub fn session_user(conn: &Connection, token: &str, now: &str) -> DbResult<Option<UserRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > ?2",
            USER_COLUMNS
        ),
        params![token, now],
        user_from_row,
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token: &str) -> DbResult<bool> {
    Ok(conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])? > 0)
}

/// Drop sessions that expired before `now`; returns how many were removed
pub fn purge_expired_sessions(conn: &Connection, now: &str) -> DbResult<usize> {
    conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            role,
            customer_id: None,
        }
    }

    #[test]
    fn create_and_find_user() {
        let conn = test_db();
        let user = create_user(&conn, &new_user("buyer@tyres.co.za", Role::Customer)).unwrap();
        assert_eq!(user.role, Role::Customer);

        let (found, hash) = find_credentials(&conn, "Buyer@Tyres.co.za").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(hash, "$argon2id$fake");
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = test_db();
        create_user(&conn, &new_user("a@b.co", Role::Admin)).unwrap();
        assert!(create_user(&conn, &new_user("A@B.co", Role::Customer)).is_err());
        assert_eq!(list_users(&conn).unwrap().len(), 1);
    }

    #[test]
    fn session_lookup_respects_expiry() {
        let conn = test_db();
        let user = create_user(&conn, &new_user("a@b.co", Role::Admin)).unwrap();
        insert_session(&conn, "tok-live", user.id, "2026-10-17T00:00:00Z").unwrap();
        insert_session(&conn, "tok-old", user.id, "2026-10-15T00:00:00Z").unwrap();

        let now = "2026-10-16T12:00:00Z";
        assert_eq!(session_user(&conn, "tok-live", now).unwrap(), Some(user));
        assert!(session_user(&conn, "tok-old", now).unwrap().is_none());
        assert!(session_user(&conn, "tok-missing", now).unwrap().is_none());

        assert_eq!(purge_expired_sessions(&conn, now).unwrap(), 1);
        assert!(delete_session(&conn, "tok-live").unwrap());
        assert!(!delete_session(&conn, "tok-live").unwrap());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"customer\"").unwrap();
        assert_eq!(role, Role::Customer);
    }
}
