//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tack_store::StoreError;
use tack_sync::SyncError;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("core error: {0}")]
    Core(#[from] tack_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Internal(_) => "internal_error",
            Self::Sync(e) => e.code(),
            Self::Store(e) => match e {
                StoreError::NotFound(_) => "not_found",
                StoreError::AlreadyExists(_) => "conflict",
                StoreError::Constraint(_) => "conflict",
                _ => "store_unavailable",
            },
            Self::Core(_) => "bad_request",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Sync(e) => match e {
                // Only pre-transaction failures surface as transport errors;
                // per-mutation business and protocol failures become outcomes.
                SyncError::BatchTooLarge { .. } => StatusCode::BAD_REQUEST,
                SyncError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
                SyncError::PermissionDenied => StatusCode::FORBIDDEN,
                SyncError::MutationFromFuture { .. } => StatusCode::CONFLICT,
                SyncError::UnknownMutationName { .. } => StatusCode::BAD_REQUEST,
                SyncError::Store(e) => store_status_code(e),
            },
            Self::Store(e) => store_status_code(e),
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Store failures are retryable infrastructure faults and map to 503, except
/// the row-level conditions a caller can act on.
fn store_status_code(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        StoreError::Constraint(_) => StatusCode::CONFLICT,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
