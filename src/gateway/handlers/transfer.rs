//! Transfer handler

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::super::auth::AuthenticatedUser;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, created, ok};
use crate::core_types::AccountId;
use crate::money::Money;
use crate::transfer::{IdempotencyKey, TransferError, TransferReceipt, TransferRequest};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Transfer request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    /// Sender account id (must belong to the caller)
    #[validate(range(min = 1))]
    #[schema(value_type = i64, example = 1)]
    pub from_account_id: AccountId,
    /// Receiver account number
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "ACC-0002")]
    pub to_account: String,
    /// Positive amount, at most 2 decimal places
    #[schema(value_type = String, example = "30.00")]
    pub amount: Money,
}

/// Transfer money to another account
///
/// POST /api/v1/transactions/transfer
///
/// Executes at most once per `Idempotency-Key`; a repeated key returns the
/// original transaction id with the "already processed" message.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/transfer",
    request_body = TransferBody,
    params(
        ("Idempotency-Key" = String, Header, description = "Client-generated unique key, max 255 bytes")
    ),
    responses(
        (status = 201, description = "Transfer executed", body = TransferReceipt),
        (status = 200, description = "Key already processed, original result", body = TransferReceipt),
        (status = 400, description = "Invalid parameters or insufficient funds"),
        (status = 401, description = "Authentication failed"),
        (status = 404, description = "Account not found"),
        (status = 503, description = "Lock timeout or store unavailable, retry with the same key")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Result<Json<TransferBody>, JsonRejection>,
) -> ApiResult<TransferReceipt> {
    let key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => value.to_str().map_err(|_| {
            TransferError::InvalidIdempotencyKey("header is not visible ASCII".into())
        })?,
        None => return Err(TransferError::MissingIdempotencyKey.into()),
    };
    let key = IdempotencyKey::new(key)?;

    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    body.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let req = TransferRequest::new(key, body.from_account_id, body.to_account, body.amount)
        .initiated_by(user.user_id);

    // Detached so a dropped connection cannot abort the unit mid-commit
    let coordinator = state.coordinator.clone();
    let receipt = tokio::spawn(async move { coordinator.transfer(req).await })
        .await
        .map_err(|e| ApiError::internal(format!("transfer task failed: {}", e)))??;

    if receipt.replayed {
        ok(receipt)
    } else {
        created(receipt)
    }
}
