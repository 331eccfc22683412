pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

use std::sync::Arc;

use auth::AccessGate;
use catalog::TaskCatalog;
use db::LedgerStore;
use service::{referrals::ReferralService, status::StatusService, tasks::TaskCompletionEngine};

/// Shared handles for request handlers. The ledger store is injected, never global.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub catalog: Arc<TaskCatalog>,
    pub gate: Arc<AccessGate>,
    pub tasks: TaskCompletionEngine,
    pub referrals: ReferralService,
    pub status: StatusService,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: TaskCatalog, gate: AccessGate) -> Self {
        let catalog = Arc::new(catalog);
        AppState {
            tasks: TaskCompletionEngine::new(store.clone(), catalog.clone()),
            referrals: ReferralService::new(store.clone()),
            status: StatusService::new(store.clone()),
            store,
            catalog,
            gate: Arc::new(gate),
        }
    }
}
