//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the
//! same `{code, message, request_id}` envelope, and translates store, cache and
//! generator failures into status codes in one place.
//!
//! # Key invariants and assumptions
//! - Error responses carry a stable `code` and a human-readable `message`.
//! - Status codes align with the error category.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorResponse;
use crate::sequence::{CacheError, SequenceError};
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
///
/// `status` must match the semantics of `body.code`.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use assetdesk::api::error::ApiError;
/// use assetdesk::api::types::ErrorResponse;
///
/// let err = ApiError {
///     status: StatusCode::NOT_FOUND,
///     body: ErrorResponse {
///         code: "not_found".to_string(),
///         message: "asset not found".to_string(),
///         request_id: None,
///     },
/// };
/// assert_eq!(err.body.code, "not_found");
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

/// Build a 404 Not Found error.
pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 409 Conflict error with a caller-provided code.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Build a 400 Bad Request error with a caller-provided code.
pub fn api_bad_request(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, code, message)
}

/// Build a 400 `validation_error`.
pub fn api_validation_error(message: &str) -> ApiError {
    api_bad_request("validation_error", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_too_many_requests(message: &str) -> ApiError {
    api_error(StatusCode::TOO_MANY_REQUESTS, "too_many_requests", message)
}

/// Build a 500 Internal Server Error from a store error.
///
/// Logs the store error and returns a generic message.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "assetdesk storage error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Build a 500 for a password that could not be hashed.
pub fn api_hash_failure(err: &argon2::password_hash::Error) -> ApiError {
    tracing::error!(error = %err, "assetdesk password hashing error");
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "failed to hash password",
    )
}

/// Build a 503 for an unreachable or misbehaving cache.
pub fn api_cache_unavailable(err: &CacheError) -> ApiError {
    tracing::error!(error = %err, "assetdesk cache error");
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "cache_unavailable",
        "identifier cache unavailable",
    )
}

/// Translate a store error.
///
/// `message` is only used for the 500 fallback; the other kinds carry their
/// own detail.
pub fn api_from_store(message: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(what) => api_not_found(&format!("{what} not found")),
        StoreError::Conflict(what) if what.starts_with("category") => {
            api_bad_request("duplicate_category", &format!("{what} already exists"))
        }
        StoreError::Conflict(what) if what == "active returning request" => api_bad_request(
            "active_returning_request",
            "assignment already has an active returning request",
        ),
        StoreError::Conflict(what) => api_conflict("conflict", &format!("{what} already exists")),
        StoreError::InvalidTransition(err) => {
            api_bad_request("invalid_transition", &err.to_string())
        }
        StoreError::Rejected(reason) => api_validation_error(&reason),
        err @ StoreError::Unexpected(_) => api_internal(message, &err),
    }
}

/// Translate an identifier generator error.
pub fn api_from_sequence(message: &str, err: SequenceError) -> ApiError {
    match err {
        SequenceError::Cache(err) => api_cache_unavailable(&err),
        SequenceError::Store(err) => api_from_store(message, err),
        SequenceError::Exhausted { key, width } => {
            tracing::error!(%key, width, "identifier sequence exhausted");
            api_conflict(
                "sequence_exhausted",
                &format!("no identifiers left for {key} at {width} digits"),
            )
        }
        SequenceError::InvalidName(name) => {
            api_validation_error(&format!("cannot derive a username from {name:?}"))
        }
    }
}
