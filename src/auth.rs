//! Password hashing, login and session tokens

use crate::database::{
    self, create_user, find_credentials, get_customer, insert_session, timestamp, NewUser, Role,
    SharedDb, UserRow,
};
use crate::error::{PortalError, Result};
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{Duration, Utc};
use rusqlite::Connection;

/// Name of the HttpOnly cookie carrying the session token
pub const SESSION_COOKIE: &str = "portal_session";

/// How long a login stays valid
pub const SESSION_TTL_HOURS: i64 = 12;

/// Hash a plain password with argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Result of a login attempt
#[derive(Debug, PartialEq)]
pub enum LoginOutcome {
    Success(UserRow),
    InvalidCredentials,
    /// Customer login whose company has not been approved (or no longer exists)
    AccessDisabled,
}

/// Check credentials and, for customer logins, the company's portal access.
///
/// The database lock is released while argon2 runs on the blocking pool.
pub async fn login(db: &SharedDb, email: &str, password: &str) -> Result<LoginOutcome> {
    let credentials = {
        let conn = database::lock(db);
        find_credentials(&conn, email)?
    };
    let Some((user, hash)) = credentials else {
        return Ok(LoginOutcome::InvalidCredentials);
    };

    let password = password.to_string();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PortalError::PasswordHash(e.to_string()))?;
    if !matches {
        log::warn!("Failed login for {}", user.email);
        return Ok(LoginOutcome::InvalidCredentials);
    }

    if user.role == Role::Customer {
        let conn = database::lock(db);
        if !has_portal_access(&conn, &user)? {
            log::warn!("Login refused for {}: portal access disabled", user.email);
            return Ok(LoginOutcome::AccessDisabled);
        }
    }
    Ok(LoginOutcome::Success(user))
}

/// Whether a customer user's company may use the portal
pub fn has_portal_access(conn: &Connection, user: &UserRow) -> Result<bool> {
    let Some(customer_id) = user.customer_id else {
        return Ok(false);
    };
    Ok(get_customer(conn, customer_id)?.is_some_and(|c| c.portal_access))
}

/// Create a session for `user_id`, returning the opaque token
pub fn start_session(conn: &Connection, user_id: i64) -> Result<String> {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let expires_at = timestamp(Utc::now() + Duration::hours(SESSION_TTL_HOURS));
    insert_session(conn, &token, user_id, &expires_at)?;
    Ok(token)
}

/// The user a session token belongs to, if the session is still live
pub fn resolve_session(conn: &Connection, token: &str) -> Result<Option<UserRow>> {
    Ok(database::session_user(conn, token, &database::now_timestamp())?)
}

/// Create the configured admin login unless a user with that email exists.
///
/// Returns true when a user was created.
pub fn ensure_admin(conn: &Connection, email: &str, password: &str) -> Result<bool> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(PortalError::PasswordHash(
            "admin email and password must not be empty".to_string(),
        ));
    }
    if find_credentials(conn, email)?.is_some() {
        log::debug!("Admin {} already exists", email);
        return Ok(false);
    }

    create_user(
        conn,
        &NewUser {
            email: email.to_string(),
            password_hash: hash_password(password)?,
            role: Role::Admin,
            customer_id: None,
        },
    )?;
    log::info!("Bootstrapped admin user {}", email);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{set_portal_access, test_db};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn seed_customer_user(conn: &Connection, access: bool) -> UserRow {
        conn.execute(
            "INSERT INTO customers (erp_customer_id, name, updated_at)
             VALUES ('c-1', 'Rand Tyres', '2026-10-16T00:00:00Z')",
            [],
        )
        .unwrap();
        set_portal_access(conn, 1, access).unwrap();
        create_user(
            conn,
            &NewUser {
                email: "buyer@rand.co.za".to_string(),
                password_hash: hash_password("tread-depth").unwrap(),
                role: Role::Customer,
                customer_id: Some(1),
            },
        )
        .unwrap()
    }

    fn shared(conn: Connection) -> SharedDb {
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[tokio::test]
    async fn customer_with_access_logs_in() {
        let conn = test_db();
        let user = seed_customer_user(&conn, true);
        let db = shared(conn);
        assert_eq!(
            login(&db, "buyer@rand.co.za", "tread-depth").await.unwrap(),
            LoginOutcome::Success(user)
        );
    }

    #[tokio::test]
    async fn customer_without_access_is_refused() {
        let conn = test_db();
        seed_customer_user(&conn, false);
        let db = shared(conn);
        assert_eq!(
            login(&db, "buyer@rand.co.za", "tread-depth").await.unwrap(),
            LoginOutcome::AccessDisabled
        );
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email() {
        let conn = test_db();
        seed_customer_user(&conn, true);
        let db = shared(conn);
        assert_eq!(
            login(&db, "buyer@rand.co.za", "nope").await.unwrap(),
            LoginOutcome::InvalidCredentials
        );
        assert_eq!(
            login(&db, "ghost@rand.co.za", "tread-depth").await.unwrap(),
            LoginOutcome::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn database_is_free_while_password_is_checked() {
        let conn = test_db();
        seed_customer_user(&conn, true);
        let db = shared(conn);
        let finished = AtomicBool::new(false);

        let attempt = async {
            let outcome = login(&db, "buyer@rand.co.za", "tread-depth").await;
            finished.store(true, Ordering::SeqCst);
            outcome
        };
        let observer = async {
            // Polled once the login is parked on the hash check
            let free = db.try_lock().is_ok();
            (free, finished.load(Ordering::SeqCst))
        };
        let (outcome, (free, login_done)) = tokio::join!(attempt, observer);

        assert!(matches!(outcome.unwrap(), LoginOutcome::Success(_)));
        assert!(!login_done);
        assert!(free);
    }

    #[test]
    fn sessions_resolve_to_user() {
        let conn = test_db();
        let user = seed_customer_user(&conn, true);
        let token = start_session(&conn, user.id).unwrap();
        assert_eq!(resolve_session(&conn, &token).unwrap(), Some(user));
        assert_eq!(resolve_session(&conn, "bogus").unwrap(), None);
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let conn = test_db();
        assert!(ensure_admin(&conn, "ops@tyres.co.za", "admin-pass").unwrap());
        assert!(!ensure_admin(&conn, "OPS@tyres.co.za", "other").unwrap());

        let db = shared(conn);
        let outcome = login(&db, "ops@tyres.co.za", "admin-pass").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Success(u) if u.role == Role::Admin));
    }
}
