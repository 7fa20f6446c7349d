use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Machine-readable codes carried in every error body.
///
/// Error bodies look like
/// `{"success": false, "code": "STORAGE_ERROR", "error": "Database error: ..."}`.
/// The `code` is stable; the `error` text is for humans.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Failure of a query API request.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed request input. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// The database rejected a statement or could not be reached. HTTP 500.
    #[error("Database error: {0}")]
    Storage(String),

    /// Request deadline exceeded. HTTP 503.
    #[error("{0}")]
    Unavailable(String),

    /// HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, error_code::NOT_FOUND),
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, error_code::VALIDATION_FAILED),
            ServiceError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_code::STORAGE_ERROR),
            ServiceError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, error_code::UNAVAILABLE),
            ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_code::INTERNAL),
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.classify().1
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = serde_json::json!({
            "success": false,
            "code": code,
            "error": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
