use std::sync::Arc;

use super::auth::JwtVerifier;
use crate::db::Database;
use crate::history::HistoryService;
use crate::store::LedgerStore;
use crate::transfer::TransferCoordinator;

/// Shared gateway state
pub struct AppState {
    pub coordinator: Arc<TransferCoordinator>,
    pub history: Arc<HistoryService>,
    pub auth: JwtVerifier,
    /// Present when running on PostgreSQL; pinged by the health check
    pub db: Option<Arc<Database>>,
    pub store_name: &'static str,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, jwt_secret: &str) -> Self {
        Self {
            store_name: store.name(),
            coordinator: Arc::new(TransferCoordinator::new(store.clone())),
            history: Arc::new(HistoryService::new(store)),
            auth: JwtVerifier::new(jwt_secret),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }
}
