//! Session cookie extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use super::{ApiError, AppState};
use crate::auth::{self, SESSION_COOKIE};
use crate::database::{self, Role, UserRow};

/// The logged-in caller. Rejects with 401 without a live session and 403 when
/// a customer's portal access was revoked after login.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| ApiError::Unauthorized("login required".to_string()))?;

        let conn = database::lock(&state.db);
        let user = auth::resolve_session(&conn, &token)?
            .ok_or_else(|| ApiError::Unauthorized("session expired".to_string()))?;

        if user.role == Role::Customer && !auth::has_portal_access(&conn, &user)? {
            return Err(ApiError::Forbidden("portal access disabled".to_string()));
        }
        Ok(CurrentUser(user))
    }
}

/// A logged-in admin
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRow);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("admin only".to_string()));
        }
        Ok(AdminUser(user))
    }
}
