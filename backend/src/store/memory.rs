use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, DataStore, StoreError, StoreResult};
use crate::models::account::{Account, NewAccount};
use crate::models::habit::{Habit, NewHabit};
use crate::models::habit_log::{HabitLog, LogQuery, Toggled};

/// In-process store with the same contract as the Postgres tables:
/// newest-first habits, cascade on delete and one log per (habit, date).
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    offline: Arc<AtomicBool>,
}

#[derive(Default)]
struct Tables {
    habits: Vec<Habit>,
    logs: Vec<HabitLog>,
    accounts: Vec<Account>,
    revoked: HashMap<String, DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with `StoreError::Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select_habits(&self, owner: Uuid) -> StoreResult<Vec<Habit>> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        let mut habits: Vec<Habit> = tables
            .habits
            .iter()
            .filter(|h| h.user_id == owner)
            .cloned()
            .collect();
        // Insertion order breaks ties between equal timestamps.
        habits.reverse();
        habits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(habits)
    }

    async fn find_habit(&self, owner: Uuid, habit_id: Uuid) -> StoreResult<Option<Habit>> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .habits
            .iter()
            .find(|h| h.id == habit_id && h.user_id == owner)
            .cloned())
    }

    async fn insert_habit(&self, row: NewHabit) -> StoreResult<Habit> {
        self.check_online()?;
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            created_at: Utc::now(),
        };
        self.tables.lock().await.habits.push(habit.clone());
        Ok(habit)
    }

    async fn delete_habit(&self, owner: Uuid, habit_id: Uuid) -> StoreResult<bool> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;
        let before = tables.habits.len();
        tables
            .habits
            .retain(|h| !(h.id == habit_id && h.user_id == owner));
        let removed = tables.habits.len() != before;
        if removed {
            tables.logs.retain(|l| l.habit_id != habit_id);
        }
        Ok(removed)
    }

    async fn select_logs(&self, owner: Uuid, query: &LogQuery) -> StoreResult<Vec<HabitLog>> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .logs
            .iter()
            .filter(|l| l.user_id == owner && query.matches(l))
            .cloned()
            .collect())
    }

    async fn toggle_log(
        &self,
        owner: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Toggled> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;

        if !tables
            .habits
            .iter()
            .any(|h| h.id == habit_id && h.user_id == owner)
        {
            return Err(StoreError::Conflict(format!("habit {habit_id} does not exist")));
        }

        let existing = tables.logs.iter().position(|l| {
            l.habit_id == habit_id && l.user_id == owner && l.logged_date == date
        });

        match existing {
            Some(index) => Ok(Toggled::Unchecked(tables.logs.remove(index))),
            None => {
                let log = HabitLog {
                    id: Uuid::new_v4(),
                    habit_id,
                    user_id: owner,
                    logged_date: date,
                    created_at: Utc::now(),
                };
                tables.logs.push(log.clone());
                Ok(Toggled::Checked(log))
            }
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_online()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, row: NewAccount) -> StoreResult<Account> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;
        if tables.accounts.iter().any(|a| a.email == row.email) {
            return Err(StoreError::Conflict("email already registered".into()));
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: row.email,
            password_hash: row.password_hash,
            confirmed: row.confirmed,
            created_at: Utc::now(),
        };
        tables.accounts.push(account.clone());
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn confirm_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .map(|account| {
                account.confirmed = true;
                account.clone()
            }))
    }

    async fn revoke_session(
        &self,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        tables.revoked.retain(|_, exp| *exp > now);
        tables.revoked.insert(token_hash.to_string(), expires_at);
        Ok(())
    }

    async fn is_session_revoked(&self, token_hash: &str) -> StoreResult<bool> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables.revoked.contains_key(token_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_habit(store: &MemoryStore, owner: Uuid, name: &str) -> Habit {
        store
            .insert_habit(NewHabit::new(owner, name, None).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_habits_listed_newest_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let first = seed_habit(&store, owner, "Read").await;
        let second = seed_habit(&store, owner, "Run").await;

        let habits = store.select_habits(owner).await.unwrap();
        assert_eq!(habits, vec![second, first]);
    }

    #[tokio::test]
    async fn test_rows_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let habit = seed_habit(&store, owner, "Read").await;

        assert!(store.select_habits(stranger).await.unwrap().is_empty());
        assert!(store.find_habit(stranger, habit.id).await.unwrap().is_none());
        assert!(!store.delete_habit(stranger, habit.id).await.unwrap());
        assert!(store.toggle_log(stranger, habit.id, Utc::now().date_naive()).await.is_err());
        assert_eq!(store.select_habits(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_flips_presence() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let habit = seed_habit(&store, owner, "Read").await;
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();

        let first = store.toggle_log(owner, habit.id, date).await.unwrap();
        assert!(first.is_checked());
        let second = store.toggle_log(owner, habit.id, date).await.unwrap();
        assert_eq!(second, Toggled::Unchecked(first.log().clone()));
        assert!(store
            .select_logs(owner, &LogQuery::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_logs() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let doomed = seed_habit(&store, owner, "Read").await;
        let kept = seed_habit(&store, owner, "Run").await;
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        store.toggle_log(owner, doomed.id, date).await.unwrap();
        store.toggle_log(owner, kept.id, date).await.unwrap();

        assert!(store.delete_habit(owner, doomed.id).await.unwrap());

        let logs = store.select_logs(owner, &LogQuery::default()).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].habit_id, kept.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let row = NewAccount {
            email: "a@b.com".into(),
            password_hash: "hash".into(),
            confirmed: false,
        };
        store.insert_account(row.clone()).await.unwrap();
        let err = store.insert_account(row).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.select_habits(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }
}
