//! Admin endpoints: customer access, user provisioning, quotes and sync

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ok, ApiError, ApiResponse, ApiResult, AdminUser, AppState};
use crate::auth::hash_password;
use crate::database::{
    self, find_credentials, get_customer, list_customers, list_quotes, list_users,
    set_portal_access, table_count, CountedTable, CustomerRow, NewUser, QuoteRow, Role, UserRow,
};
use crate::scheduler::{JobStats, SyncKind};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct AccessUpdate {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    email: String,
    password: String,
    role: Role,
    customer_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QuotesQuery {
    customer_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    running: bool,
    jobs: BTreeMap<SyncKind, JobStats>,
    counts: BTreeMap<&'static str, i64>,
}

/// GET /api/admin/customers
pub async fn customers(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Vec<CustomerRow>> {
    let conn = database::lock(&state.db);
    ok(list_customers(&conn)?)
}

/// PUT /api/admin/customers/{id}/access {enabled}
pub async fn set_access(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<AccessUpdate>,
) -> ApiResult<CustomerRow> {
    let conn = database::lock(&state.db);
    if !set_portal_access(&conn, id, body.enabled)? {
        return Err(ApiError::NotFound(format!("customer {} not found", id)));
    }
    log::info!(
        "{} set portal access for customer {} to {}",
        admin.email,
        id,
        body.enabled
    );
    let customer = get_customer(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("customer {} not found", id)))?;
    ok(customer)
}

/// GET /api/admin/users
pub async fn users(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Vec<UserRow>> {
    let conn = database::lock(&state.db);
    ok(list_users(&conn)?)
}

/// POST /api/admin/users {email, password, role, customer_id?}
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateUser>,
) -> Result<(StatusCode, Json<ApiResponse<UserRow>>), ApiError> {
    let email = body.email.trim();
    if !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let customer_id = match (body.role, body.customer_id) {
        (Role::Customer, None) => {
            return Err(ApiError::BadRequest("customer users need a customer_id".to_string()))
        }
        (Role::Admin, Some(_)) => {
            return Err(ApiError::BadRequest("admin users cannot be linked to a customer".to_string()))
        }
        (_, customer_id) => customer_id,
    };

    // Hash outside the database lock
    let password_hash = hash_password(&body.password)?;

    let conn = database::lock(&state.db);
    if find_credentials(&conn, email)?.is_some() {
        return Err(ApiError::Conflict(format!("{} already exists", email)));
    }
    if let Some(id) = customer_id {
        if get_customer(&conn, id)?.is_none() {
            return Err(ApiError::BadRequest(format!("customer {} not found", id)));
        }
    }

    let user = database::create_user(
        &conn,
        &NewUser {
            email: email.to_string(),
            password_hash,
            role: body.role,
            customer_id,
        },
    )?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user))))
}

/// GET /api/admin/quotes?customer_id=
pub async fn quotes(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<QuotesQuery>,
) -> ApiResult<Vec<QuoteRow>> {
    let conn = database::lock(&state.db);
    ok(list_quotes(&conn, params.customer_id)?)
}

/// POST /api/admin/sync - start a pass in the background
pub async fn trigger_sync(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<(StatusCode, Json<ApiResponse<bool>>), ApiError> {
    if !state.scheduler.spawn_pass() {
        return Err(ApiError::Conflict("a sync pass is already running".to_string()));
    }
    log::info!("Manual sync triggered by {}", admin.email);
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::ok(true))))
}

/// GET /api/admin/sync/status
pub async fn sync_status(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<SyncStatus> {
    let counts = {
        let conn = database::lock(&state.db);
        let mut counts = BTreeMap::new();
        for (name, table) in [
            ("products", CountedTable::Products),
            ("customers", CountedTable::Customers),
            ("quotes", CountedTable::Quotes),
            ("users", CountedTable::Users),
        ] {
            counts.insert(name, table_count(&conn, table)?);
        }
        counts
    };

    ok(SyncStatus {
        running: state.scheduler.is_running(),
        jobs: state.scheduler.snapshot(),
        counts,
    })
}
