//! Transaction history handler

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use super::super::auth::AuthenticatedUser;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};
use crate::history::{DEFAULT_LIMIT, DEFAULT_PAGE, HistoryFilter, HistoryPage};
use crate::store::TransactionType;

/// History query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// 1-based page number (default 1)
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    /// Page size (default 10)
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
    /// TRANSFER | DEPOSIT | WITHDRAWAL
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Account number on either leg
    pub account_id: Option<String>,
}

impl HistoryParams {
    fn into_filter(self) -> Result<HistoryFilter, ApiError> {
        let kind = self
            .kind
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_uppercase().parse::<TransactionType>())
            .transpose()
            .map_err(ApiError::bad_request)?;

        Ok(HistoryFilter {
            page: self.page.unwrap_or(DEFAULT_PAGE),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            kind,
            account_number: self.account_id.filter(|s| !s.is_empty()),
        })
    }
}

/// Transaction history of the caller's accounts
///
/// GET /api/v1/transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(HistoryParams),
    responses(
        (status = 200, description = "One page of history, newest first", body = HistoryPage),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Authentication failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<HistoryPage> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    params
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let page = state
        .history
        .get_history(user.user_id, params.into_filter()?)
        .await?;
    ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let filter = HistoryParams::default().into_filter().unwrap();
        assert_eq!(filter, HistoryFilter::default());
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let params = HistoryParams {
            kind: Some("deposit".into()),
            ..Default::default()
        };
        assert_eq!(
            params.into_filter().unwrap().kind,
            Some(TransactionType::Deposit)
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let params = HistoryParams {
            kind: Some("REFUND".into()),
            ..Default::default()
        };
        assert!(params.into_filter().is_err());
    }

    #[test]
    fn test_zero_page_fails_validation() {
        let params = HistoryParams {
            page: Some(0),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
