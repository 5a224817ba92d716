//! History Service

use std::sync::Arc;

use tracing::debug;

use super::error::HistoryError;
use super::types::{HistoryFilter, HistoryPage};
use crate::core_types::UserId;
use crate::store::{HistoryQuery, LedgerStore};

pub struct HistoryService {
    store: Arc<dyn LedgerStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Records where either leg belongs to `user_id`, newest first.
    pub async fn get_history(
        &self,
        user_id: UserId,
        filter: HistoryFilter,
    ) -> Result<HistoryPage, HistoryError> {
        filter.validate()?;

        let owned = self.store.owned_account_ids(user_id).await?;
        let Some(query) = HistoryQuery::new(
            owned,
            filter.kind,
            filter.account_number.clone(),
            filter.offset(),
            filter.limit,
        ) else {
            debug!(user_id, "User owns no accounts, empty history");
            return Ok(HistoryPage::empty(&filter));
        };

        let (data, count) = self.store.query_history(&query).await?;
        debug!(
            user_id,
            page = filter.page,
            limit = filter.limit,
            count,
            returned = data.len(),
            "History page served"
        );
        Ok(HistoryPage::new(data, count, &filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::{DateTime, Duration, Utc};

    use crate::core_types::{AccountId, Clock, FixedClock};
    use crate::money::Money;
    use crate::store::{MemoryLedgerStore, NewTransaction, TransactionType};

    /// Advances one second per call
    struct SteppingClock {
        base: DateTime<Utc>,
        ticks: AtomicI64,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            self.base + Duration::seconds(self.ticks.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn stepping_store() -> MemoryLedgerStore {
        MemoryLedgerStore::with_clock(Arc::new(SteppingClock {
            base: Utc::now(),
            ticks: AtomicI64::new(0),
        }))
    }

    fn money(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn deposit(to: AccountId, amount: &str) -> NewTransaction {
        NewTransaction {
            amount: money(amount),
            from_account_id: None,
            to_account_id: Some(to),
            kind: TransactionType::Deposit,
        }
    }

    /// User 1 owns A and A2, user 2 owns B, user 3 owns C and D.
    fn seeded() -> (Arc<MemoryLedgerStore>, HistoryService) {
        let store = Arc::new(stepping_store());
        let a = store.open_account(1, "A", money("100")).unwrap();
        let a2 = store.open_account(1, "A2", money("0")).unwrap();
        let b = store.open_account(2, "B", money("50")).unwrap();
        let c = store.open_account(3, "C", money("10")).unwrap();
        let d = store.open_account(3, "D", money("10")).unwrap();

        store
            .record_external(NewTransaction::transfer(a.id, b.id, money("30")))
            .unwrap();
        store
            .record_external(NewTransaction::transfer(b.id, a2.id, money("5")))
            .unwrap();
        store
            .record_external(NewTransaction::transfer(c.id, d.id, money("1")))
            .unwrap();
        store.record_external(deposit(a.id, "20")).unwrap();

        let service = HistoryService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_user_without_accounts_gets_empty_page() {
        let (_, service) = seeded();
        let page = service.get_history(42, HistoryFilter::default()).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.count, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 10);
    }

    #[tokio::test]
    async fn test_only_owned_legs_are_visible() {
        let (_, service) = seeded();

        let page = service.get_history(1, HistoryFilter::default()).await.unwrap();
        assert_eq!(page.count, 3);
        // Newest first
        let ids: Vec<_> = page.data.iter().map(|e| e.record.id).collect();
        assert_eq!(ids, vec![4, 2, 1]);

        let page = service.get_history(2, HistoryFilter::default()).await.unwrap();
        assert_eq!(page.count, 2);
        assert!(
            page.data
                .iter()
                .all(|e| e.from_account_number.as_deref() == Some("B")
                    || e.to_account_number.as_deref() == Some("B"))
        );
    }

    #[tokio::test]
    async fn test_type_filter() {
        let (_, service) = seeded();
        let page = service
            .get_history(1, HistoryFilter::default().kind(TransactionType::Deposit))
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].record.kind, TransactionType::Deposit);
        assert_eq!(page.data[0].from_account_number, None);
        assert_eq!(page.data[0].to_account_number.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_account_number_filter_is_scoped() {
        let (_, service) = seeded();

        let page = service
            .get_history(1, HistoryFilter::default().account_number("B"))
            .await
            .unwrap();
        assert_eq!(page.count, 2);

        // C-D transfer matches the filter value but user 1 owns neither leg
        let page = service
            .get_history(1, HistoryFilter::default().account_number("C"))
            .await
            .unwrap();
        assert_eq!(page.count, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_invalid_page_rejected() {
        let (_, service) = seeded();
        let err = service
            .get_history(1, HistoryFilter::default().page(0))
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_pages_concatenate_to_full_set() {
        let store = Arc::new(stepping_store());
        let a = store.open_account(1, "A", money("0")).unwrap();
        let b = store.open_account(2, "B", money("0")).unwrap();
        for _ in 0..25 {
            store
                .record_external(NewTransaction::transfer(b.id, a.id, money("1")))
                .unwrap();
        }
        let service = HistoryService::new(store.clone());

        let full = service
            .get_history(1, HistoryFilter::default().limit(100))
            .await
            .unwrap();
        assert_eq!(full.count, 25);

        let mut concatenated = Vec::new();
        for page_no in 1..=3 {
            let page = service
                .get_history(1, HistoryFilter::default().page(page_no).limit(10))
                .await
                .unwrap();
            assert_eq!(page.count, 25);
            assert_eq!(page.total_pages, 3);
            concatenated.extend(page.data);
        }
        assert_eq!(concatenated, full.data);

        let unique: HashSet<_> = concatenated.iter().map(|e| e.record.id).collect();
        assert_eq!(unique.len(), 25);

        // Past the end: empty data, same totals
        let beyond = service
            .get_history(1, HistoryFilter::default().page(4).limit(10))
            .await
            .unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.count, 25);
    }

    #[tokio::test]
    async fn test_equal_timestamps_break_ties_by_id() {
        let store = Arc::new(MemoryLedgerStore::with_clock(Arc::new(FixedClock(Utc::now()))));
        let a = store.open_account(1, "A", money("0")).unwrap();
        for _ in 0..5 {
            store.record_external(deposit(a.id, "1")).unwrap();
        }
        let service = HistoryService::new(store);

        let page = service.get_history(1, HistoryFilter::default()).await.unwrap();
        let ids: Vec<_> = page.data.iter().map(|e| e.record.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }
}
