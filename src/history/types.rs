//! History request/response types

use serde::Serialize;
use utoipa::ToSchema;

use super::error::HistoryError;
use crate::store::{HistoryEntry, TransactionType};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Client filters; the owned-account scope is added by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFilter {
    pub page: u32,
    pub limit: u32,
    pub kind: Option<TransactionType>,
    /// Either leg's account number
    pub account_number: Option<String>,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            kind: None,
            account_number: None,
        }
    }
}

impl HistoryFilter {
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn kind(mut self, kind: TransactionType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn account_number(mut self, account_number: impl Into<String>) -> Self {
        self.account_number = Some(account_number.into());
        self
    }

    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.page < 1 {
            return Err(HistoryError::InvalidFilter("page must be >= 1".into()));
        }
        if self.limit < 1 {
            return Err(HistoryError::InvalidFilter("limit must be >= 1".into()));
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub data: Vec<HistoryEntry>,
    /// Total rows matching the filter, across all pages
    pub count: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl HistoryPage {
    pub fn new(data: Vec<HistoryEntry>, count: u64, filter: &HistoryFilter) -> Self {
        Self {
            data,
            count,
            page: filter.page,
            limit: filter.limit,
            total_pages: count.div_ceil(u64::from(filter.limit.max(1))),
        }
    }

    pub fn empty(filter: &HistoryFilter) -> Self {
        Self::new(Vec::new(), 0, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let filter = HistoryFilter::default();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_offset() {
        assert_eq!(HistoryFilter::default().page(3).limit(7).offset(), 14);
    }

    #[test]
    fn test_validation() {
        assert!(HistoryFilter::default().page(0).validate().is_err());
        assert!(HistoryFilter::default().limit(0).validate().is_err());
        assert!(HistoryFilter::default().validate().is_ok());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let filter = HistoryFilter::default().limit(10);
        assert_eq!(HistoryPage::new(Vec::new(), 25, &filter).total_pages, 3);
        assert_eq!(HistoryPage::new(Vec::new(), 20, &filter).total_pages, 2);
        assert_eq!(HistoryPage::empty(&filter).total_pages, 0);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let json = serde_json::to_value(HistoryPage::empty(&HistoryFilter::default())).unwrap();
        assert_eq!(json["totalPages"], 0);
        assert_eq!(json["count"], 0);
        assert!(json["data"].as_array().unwrap().is_empty());
    }
}
