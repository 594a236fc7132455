use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::habit::{Habit, NewHabit};
use crate::models::habit_log::{HabitLog, LogQuery, Toggled};
use crate::store::{DataStore, StoreResult};
use crate::view::{Command, CommandOutcome};

type CellKey = (Uuid, NaiveDate);
type CellMap = std::sync::Mutex<HashMap<CellKey, Arc<Mutex<()>>>>;

fn lock_cells(cells: &CellMap) -> std::sync::MutexGuard<'_, HashMap<CellKey, Arc<Mutex<()>>>> {
    cells.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A claim on one (habit, date) cell lock. Dropping it, including when the
/// owning future is cancelled, forgets the cell once nobody else holds it.
struct CellLease<'a> {
    cells: &'a CellMap,
    key: CellKey,
    cell: Option<Arc<Mutex<()>>>,
}

impl<'a> CellLease<'a> {
    fn acquire(cells: &'a CellMap, key: CellKey) -> Self {
        let cell = lock_cells(cells).entry(key).or_default().clone();
        Self {
            cells,
            key,
            cell: Some(cell),
        }
    }

    async fn lock(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.cell {
            Some(cell) => Some(cell.lock().await),
            None => None,
        }
    }
}

impl Drop for CellLease<'_> {
    fn drop(&mut self) {
        let mut cells = lock_cells(self.cells);
        drop(self.cell.take());
        if cells
            .get(&self.key)
            .is_some_and(|c| Arc::strong_count(c) == 1)
        {
            cells.remove(&self.key);
        }
    }
}

/// Habit operations for one caller at a time, on top of a [`DataStore`].
///
/// Every store call is bounded by `timeout`; an expired call surfaces as
/// `AppError::StoreUnavailable`. Toggles on the same (habit, date) cell are
/// serialized so two overlapping requests cannot both insert.
#[derive(Clone)]
pub struct HabitRepository {
    store: Arc<dyn DataStore>,
    timeout: Duration,
    cells: Arc<CellMap>,
}

impl HabitRepository {
    pub fn new(store: Arc<dyn DataStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            cells: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    async fn call<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> AppResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AppError::StoreUnavailable(format!(
                "data store did not answer within {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.call(self.store.ping()).await
    }

    /// Newest first.
    pub async fn list_habits(&self, owner: Uuid) -> AppResult<Vec<Habit>> {
        self.call(self.store.select_habits(owner)).await
    }

    pub async fn get_habit(&self, owner: Uuid, habit_id: Uuid) -> AppResult<Habit> {
        self.call(self.store.find_habit(owner, habit_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Habit not found".into()))
    }

    pub async fn list_logs(&self, owner: Uuid) -> AppResult<Vec<HabitLog>> {
        self.query_logs(owner, &LogQuery::default()).await
    }

    pub async fn query_logs(&self, owner: Uuid, query: &LogQuery) -> AppResult<Vec<HabitLog>> {
        self.call(self.store.select_logs(owner, query)).await
    }

    pub async fn create_habit(
        &self,
        owner: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Habit> {
        let row = NewHabit::new(owner, name, description)?;
        let habit = self.call(self.store.insert_habit(row)).await?;
        tracing::info!(user_id = %owner, habit_id = %habit.id, "Habit created");
        Ok(habit)
    }

    /// Deleting a habit that is absent or owned by someone else is a no-op.
    pub async fn delete_habit(&self, owner: Uuid, habit_id: Uuid) -> AppResult<bool> {
        let removed = self.call(self.store.delete_habit(owner, habit_id)).await?;
        if removed {
            tracing::info!(user_id = %owner, habit_id = %habit_id, "Habit deleted");
        } else {
            tracing::debug!(user_id = %owner, habit_id = %habit_id, "Delete of unknown habit ignored");
        }
        Ok(removed)
    }

    pub async fn toggle_log(
        &self,
        owner: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
    ) -> AppResult<Toggled> {
        let lease = CellLease::acquire(&self.cells, (habit_id, date));
        let _guard = lease.lock().await;
        self.toggle_unserialized(owner, habit_id, date).await
    }

    async fn toggle_unserialized(
        &self,
        owner: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
    ) -> AppResult<Toggled> {
        // Ownership check first so a stranger's habit id reads as absent.
        self.get_habit(owner, habit_id).await?;

        let toggled = self.call(self.store.toggle_log(owner, habit_id, date)).await?;
        tracing::debug!(
            user_id = %owner,
            habit_id = %habit_id,
            date = %date,
            checked = toggled.is_checked(),
            "Habit log toggled"
        );
        Ok(toggled)
    }

    /// Runs a view command against the store and returns the store's confirmation.
    pub async fn execute(&self, owner: Uuid, command: &Command) -> AppResult<CommandOutcome> {
        match command {
            Command::CreateHabit { name, description } => self
                .create_habit(owner, name, description.as_deref())
                .await
                .map(CommandOutcome::HabitCreated),
            Command::DeleteHabit { habit_id } => {
                let removed = self.delete_habit(owner, *habit_id).await?;
                Ok(CommandOutcome::HabitDeleted {
                    habit_id: *habit_id,
                    removed,
                })
            }
            Command::ToggleLog { habit_id, date } => self
                .toggle_log(owner, *habit_id, *date)
                .await
                .map(CommandOutcome::LogToggled),
        }
    }

    #[cfg(test)]
    async fn tracked_cells(&self) -> usize {
        lock_cells(&self.cells).len()
    }
}
