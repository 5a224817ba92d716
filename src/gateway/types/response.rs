//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError` / `ApiResult`: handler error path, rendered in the same envelope
//! - `error_codes`: Standard error code constants

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::history::HistoryError;
use crate::transfer::TransferError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or error detail (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

/// Machine-readable part of an error response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable error name, e.g. `INSUFFICIENT_FUNDS`
    #[schema(example = "INSUFFICIENT_FUNDS")]
    pub error: String,
    /// Whether the identical request may be resubmitted
    pub retryable: bool,
}

// ============================================================================
// Handler Error Path
// ============================================================================

/// Error returned by handlers, rendered as `ApiResponse<ErrorDetail>`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
    pub detail: ErrorDetail,
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 with the success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// 201 with the success envelope
pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

impl ApiError {
    fn new(status: StatusCode, code: i32, error: &str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
            detail: ErrorDetail {
                error: error.to_string(),
                retryable: false,
            },
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
            "INVALID_PARAMETER",
            msg,
        )
    }

    pub fn unauthorized(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, "UNAUTHORIZED", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            "INTERNAL_ERROR",
            msg,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            code: self.code,
            msg: self.msg,
            data: Some(self.detail),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let code = match &e {
            TransferError::MissingIdempotencyKey | TransferError::InvalidIdempotencyKey(_) => {
                error_codes::INVALID_IDEMPOTENCY_KEY
            }
            TransferError::InsufficientFunds => error_codes::INSUFFICIENT_FUNDS,
            TransferError::SenderNotFound | TransferError::ReceiverNotFound => {
                error_codes::ACCOUNT_NOT_FOUND
            }
            TransferError::LockTimeout | TransferError::ServiceUnavailable(_) => {
                error_codes::SERVICE_UNAVAILABLE
            }
            TransferError::Conflict(_) => error_codes::CONFLICT,
            TransferError::DatabaseError(_) => error_codes::INTERNAL_ERROR,
            _ => error_codes::INVALID_PARAMETER,
        };
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut err = Self::new(status, code, e.code(), e.to_string());
        err.detail.retryable = e.is_retryable();
        err
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        let code = match &e {
            HistoryError::InvalidFilter(_) => error_codes::INVALID_PARAMETER,
            HistoryError::ServiceUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
            HistoryError::DatabaseError(_) => error_codes::INTERNAL_ERROR,
        };
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut err = Self::new(status, code, e.code(), e.to_string());
        err.detail.retryable = e.is_retryable();
        err
    }
}

// ============================================================================
// Error Codes
// ============================================================================

pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_FUNDS: i32 = 1002;
    pub const INVALID_IDEMPOTENCY_KEY: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4091;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5001;
    pub const SERVICE_UNAVAILABLE: i32 = 5003;
}
