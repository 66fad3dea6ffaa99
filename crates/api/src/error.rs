//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The internal service credential was missing or wrong.
    Forbidden,
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        // Client-correctable business outcomes.
        DomainError::InsufficientStock { .. } | DomainError::InvalidOrderStatus { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        // Storage details stay out of the response body.
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "internal storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
