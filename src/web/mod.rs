//! JSON API for the storefront
//!
//! Every response uses the `{success, data, error}` envelope. The database
//! lock is taken per request and always released before any ERP call.

mod account;
mod admin;
mod cart;
mod catalog;
mod session;

pub use session::{AdminUser, CurrentUser};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::cart::CartStore;
use crate::database::SharedDb;
use crate::dear::DearClient;
use crate::error::PortalError;
use crate::scheduler::Scheduler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub dear: Arc<DearClient>,
    pub carts: Arc<CartStore>,
    pub scheduler: Arc<Scheduler>,
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Request failures, mapped onto HTTP status codes
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// The ERP failed or refused the request
    Upstream(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Upstream(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ApiResponse::failure(self.message()))).into_response()
    }
}

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        log::error!("Request failed: {}", err);
        match err {
            PortalError::Database(_) | PortalError::PasswordHash(_) => {
                ApiError::Internal("internal error".to_string())
            }
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        log::error!("Database error: {}", err);
        ApiError::Internal("internal error".to_string())
    }
}

/// Build the API router, optionally serving static UI files for other paths
pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/api/health", get(catalog::health))
        .route("/api/products", get(catalog::list))
        .route("/api/products/{sku}", get(catalog::detail))
        .route("/api/warehouses", get(catalog::warehouses))
        .route("/api/availability", get(catalog::availability))
        .route(
            "/api/cart",
            get(cart::view).post(cart::add).delete(cart::clear),
        )
        .route("/api/cart/{sku}", delete(cart::remove))
        .route("/api/cart/checkout", post(cart::checkout))
        .route("/api/customers/me", get(account::me))
        .route("/api/quotes", get(account::quotes))
        .route("/api/auth/login", post(account::login))
        .route("/api/auth/logout", post(account::logout))
        .route("/api/admin/customers", get(admin::customers))
        .route("/api/admin/customers/{id}/access", put(admin::set_access))
        .route("/api/admin/users", get(admin::users).post(admin::create_user))
        .route("/api/admin/quotes", get(admin::quotes))
        .route("/api/admin/sync", post(admin::trigger_sync))
        .route("/api/admin/sync/status", get(admin::sync_status))
        .with_state(state);

    match static_dir {
        Some(dir) => {
            log::info!("Serving static files from {}", dir.display());
            router.fallback_service(ServeDir::new(dir))
        }
        None => router,
    }
}

/// Start the web server
///
/// Binds to 0.0.0.0 (all interfaces) to work with Docker port mapping.
pub async fn serve(state: AppState, port: u16, static_dir: Option<PathBuf>) -> std::io::Result<()> {
    let app = create_router(state, static_dir);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Storefront API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
