//! Data Store boundary.
//!
//! Handlers and the repository only see these traits, so the Postgres adapter
//! and the in-memory adapter are interchangeable. Every habit and log call
//! carries the owner's id and implementations must never return or mutate
//! rows that belong to another user.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::account::{Account, NewAccount};
use crate::models::habit::{Habit, NewHabit};
use crate::models::habit_log::{HabitLog, LogQuery, Toggled};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The `habits` and `habit_logs` tables.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Habits owned by `owner`, newest first.
    async fn select_habits(&self, owner: Uuid) -> StoreResult<Vec<Habit>>;

    async fn find_habit(&self, owner: Uuid, habit_id: Uuid) -> StoreResult<Option<Habit>>;

    async fn insert_habit(&self, row: NewHabit) -> StoreResult<Habit>;

    /// Removes the habit and all of its logs. Returns whether a habit was removed.
    async fn delete_habit(&self, owner: Uuid, habit_id: Uuid) -> StoreResult<bool>;

    async fn select_logs(&self, owner: Uuid, query: &LogQuery) -> StoreResult<Vec<HabitLog>>;

    /// Atomically removes the log for (habit, date) if present, otherwise inserts one.
    /// Callers must have checked that `owner` owns `habit_id`.
    async fn toggle_log(&self, owner: Uuid, habit_id: Uuid, date: NaiveDate)
        -> StoreResult<Toggled>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Accounts and revoked sessions backing the session provider.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `StoreError::Conflict` when the email is already registered.
    async fn insert_account(&self, row: NewAccount) -> StoreResult<Account>;

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Returns the updated account, or `None` if it does not exist.
    async fn confirm_account(&self, account_id: Uuid) -> StoreResult<Option<Account>>;

    async fn revoke_session(&self, token_hash: &str, expires_at: DateTime<Utc>)
        -> StoreResult<()>;

    async fn is_session_revoked(&self, token_hash: &str) -> StoreResult<bool>;
}
