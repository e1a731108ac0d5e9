//! Error types for tyre_portal

use thiserror::Error;

/// Unified error type for portal operations
#[derive(Debug, Error)]
pub enum PortalError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// ERP answered with a non-success status
    #[error("HTTP error {status} from {endpoint}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        endpoint: String,
        body: String,
    },

    /// Failed to parse JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// List response was neither a bare array nor the expected wrapper object
    #[error("Unexpected response shape from {endpoint}: expected array or object with `{property}`")]
    UnexpectedShape { endpoint: String, property: String },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A transient failure persisted through every retry
    #[error("{endpoint} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        source: Box<PortalError>,
    },

    /// Password hashing or verification failed
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// ERP accepted the request but returned something we cannot use
    #[error("ERP rejected request: {0}")]
    Erp(String),
}

impl PortalError {
    /// Whether the failure is worth retrying.
    ///
    /// Connection problems, timeouts, 429 and 5xx responses are transient;
    /// everything else aborts the current operation.
    pub fn is_transient(&self) -> bool {
        match self {
            PortalError::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            PortalError::HttpStatus { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }

    /// Whether the ERP asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            PortalError::HttpStatus { status, .. } if *status == reqwest::StatusCode::TOO_MANY_REQUESTS
        )
    }
}

impl From<argon2::password_hash::Error> for PortalError {
    fn from(err: argon2::password_hash::Error) -> Self {
        PortalError::PasswordHash(err.to_string())
    }
}

/// Result alias for portal operations
pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: u16) -> PortalError {
        PortalError::HttpStatus {
            status: reqwest::StatusCode::from_u16(code).unwrap(),
            endpoint: "ref/location".to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(status_error(500).is_transient());
        assert!(status_error(503).is_transient());
    }

    #[test]
    fn rate_limit_is_transient() {
        let err = status_error(429);
        assert!(err.is_transient());
        assert!(err.is_rate_limited());
    }

    #[test]
    fn client_errors_are_fatal() {
        assert!(!status_error(400).is_transient());
        assert!(!status_error(401).is_transient());
        assert!(!status_error(404).is_transient());
    }

    #[test]
    fn shape_errors_are_fatal() {
        let err = PortalError::UnexpectedShape {
            endpoint: "product".to_string(),
            property: "Products".to_string(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Products"));
    }
}
