//! Gateway types module
//!
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`] / [`ApiResult`]: handler error path
//! - [`error_codes`]: numeric codes carried in the envelope

pub mod response;

pub use response::{ApiError, ApiResponse, ApiResult, ErrorDetail, created, error_codes, ok};
