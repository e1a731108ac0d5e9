//! Login, logout and the caller's own account

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use super::{ok, ApiError, ApiResponse, ApiResult, AppState, CurrentUser};
use crate::auth::{self, LoginOutcome, SESSION_COOKIE};
use crate::database::{self, delete_session, get_customer, list_quotes, CustomerRow, QuoteRow, UserRow};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct Account {
    user: UserRow,
    customer: Option<CustomerRow>,
}

/// POST /api/auth/login {email, password}
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<UserRow>>), ApiError> {
    let user = match auth::login(&state.db, &body.email, &body.password).await? {
        LoginOutcome::Success(user) => user,
        LoginOutcome::InvalidCredentials => {
            return Err(ApiError::Unauthorized("invalid email or password".to_string()))
        }
        LoginOutcome::AccessDisabled => {
            return Err(ApiError::Forbidden(
                "portal access has not been enabled for this account".to_string(),
            ))
        }
    };
    let token = {
        let conn = database::lock(&state.db);
        auth::start_session(&conn, user.id)?
    };

    log::info!("{} logged in", user.email);
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    Ok((jar.add(cookie), Json(ApiResponse::ok(user))))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<bool>>), ApiError> {
    let ended = match jar.get(SESSION_COOKIE) {
        Some(cookie) => {
            let conn = database::lock(&state.db);
            delete_session(&conn, cookie.value())?
        }
        None => false,
    };
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(ApiResponse::ok(ended))))
}

/// GET /api/customers/me
pub async fn me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Account> {
    let customer = match user.customer_id {
        Some(id) => {
            let conn = database::lock(&state.db);
            get_customer(&conn, id)?
        }
        None => None,
    };
    ok(Account { user, customer })
}

/// GET /api/quotes - quotes raised for the caller's company
pub async fn quotes(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Vec<QuoteRow>> {
    let Some(customer_id) = user.customer_id else {
        return ok(Vec::new());
    };
    let conn = database::lock(&state.db);
    ok(list_quotes(&conn, Some(customer_id))?)
}
