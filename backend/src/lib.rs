use std::sync::Arc;

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod stats;
pub mod store;
pub mod ui;
pub mod view;

use auth::rate_limit::RateLimitState;
use auth::session::{PasswordSessionProvider, SessionProvider};
use config::Config;
use repository::HabitRepository;
use store::{AccountStore, DataStore, MemoryStore};

pub use app::router;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub habits: HabitRepository,
    pub sessions: Arc<dyn SessionProvider>,
    pub rate_limiter: RateLimitState,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        data: Arc<dyn DataStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            habits: HabitRepository::new(data, config.store_timeout()),
            sessions: Arc::new(PasswordSessionProvider::new(accounts, config.clone())),
            rate_limiter: RateLimitState::new(config.auth_rate_limit, config.auth_rate_window_secs),
            config,
        }
    }

    /// Both tables and accounts in one process-local store.
    pub fn in_memory(config: Arc<Config>, store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self::new(config, store.clone(), store)
    }
}
