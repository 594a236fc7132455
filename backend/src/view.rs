//! In-memory tracker state behind the pages.
//!
//! A [`TrackerView`] moves `Loading -> Ready`, or to `Failed` when the initial
//! load cannot reach the store. Mutations are [`Command`]s: `begin` marks the
//! command in flight, the repository runs it, and `settle` patches the local
//! collections from the store's confirmed result. Nothing is patched before
//! the store answers.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::habit::{Habit, NewHabit};
use crate::models::habit_log::{HabitLog, Toggled};
use crate::repository::HabitRepository;
use crate::stats::{self, HabitStats};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ViewStatus {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateHabit {
        name: String,
        description: Option<String>,
    },
    DeleteHabit {
        habit_id: Uuid,
    },
    ToggleLog {
        habit_id: Uuid,
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    HabitCreated(Habit),
    HabitDeleted { habit_id: Uuid, removed: bool },
    LogToggled(Toggled),
}

/// A command that has been started with [`TrackerView::begin`] and not yet settled.
#[must_use]
#[derive(Debug)]
pub struct Ticket {
    command: Command,
}

impl Ticket {
    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub date: NaiveDate,
    pub done: bool,
    /// A toggle for this cell is in flight; the control should be disabled.
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
    pub habit_id: Uuid,
    pub name: String,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerGrid {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<GridRow>,
}

#[derive(Debug)]
pub struct TrackerView {
    owner: Uuid,
    status: ViewStatus,
    habits: Vec<Habit>,
    logs: Vec<HabitLog>,
    in_flight: HashSet<(Uuid, NaiveDate)>,
    last_error: Option<String>,
}

impl TrackerView {
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            status: ViewStatus::Loading,
            habits: Vec::new(),
            logs: Vec::new(),
            in_flight: HashSet::new(),
            last_error: None,
        }
    }

    /// Builds a view and loads it in one step.
    pub async fn open(repo: &HabitRepository, owner: Uuid) -> Self {
        let mut view = Self::new(owner);
        view.load(repo).await;
        view
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == ViewStatus::Ready
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn logs(&self) -> &[HabitLog] {
        &self.logs
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub async fn load(&mut self, repo: &HabitRepository) {
        self.status = ViewStatus::Loading;
        let result = match repo.list_habits(self.owner).await {
            Ok(habits) => repo
                .list_logs(self.owner)
                .await
                .map(|logs| (habits, logs)),
            Err(err) => Err(err),
        };
        self.finish_load(result);
    }

    /// Applies a load result. Failures keep whatever was shown before and
    /// move the view to `Failed` so the error is visible.
    pub fn finish_load(&mut self, result: AppResult<(Vec<Habit>, Vec<HabitLog>)>) {
        match result {
            Ok((habits, logs)) => {
                self.habits = habits;
                self.logs = logs;
                self.in_flight.clear();
                self.status = ViewStatus::Ready;
            }
            Err(err) => {
                tracing::warn!(user_id = %self.owner, error = %err, "Tracker load failed");
                let message = err.public_message();
                self.last_error = Some(message.clone());
                self.status = ViewStatus::Failed(message);
            }
        }
    }

    pub fn begin(&mut self, command: Command) -> AppResult<Ticket> {
        let checked = self.check(&command);
        if let Err(err) = &checked {
            self.last_error = Some(err.public_message());
        }
        checked?;

        if let Command::ToggleLog { habit_id, date } = &command {
            self.in_flight.insert((*habit_id, *date));
        }
        Ok(Ticket { command })
    }

    fn check(&self, command: &Command) -> AppResult<()> {
        if !self.is_ready() {
            return Err(AppError::Conflict("Tracker is not loaded".into()));
        }
        match command {
            Command::CreateHabit { name, description } => {
                NewHabit::new(self.owner, name, description.as_deref())?;
            }
            Command::ToggleLog { habit_id, date } => {
                if self.is_pending(*habit_id, *date) {
                    return Err(AppError::Conflict(
                        "This day is already being updated".into(),
                    ));
                }
            }
            Command::DeleteHabit { .. } => {}
        }
        Ok(())
    }

    pub fn settle(
        &mut self,
        ticket: Ticket,
        result: AppResult<CommandOutcome>,
    ) -> AppResult<CommandOutcome> {
        if let Command::ToggleLog { habit_id, date } = &ticket.command {
            self.in_flight.remove(&(*habit_id, *date));
        }

        match result {
            Ok(outcome) => {
                self.patch(&outcome);
                self.last_error = None;
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(user_id = %self.owner, error = %err, "Tracker command failed");
                self.last_error = Some(err.public_message());
                Err(err)
            }
        }
    }

    fn patch(&mut self, outcome: &CommandOutcome) {
        match outcome {
            CommandOutcome::HabitCreated(habit) => {
                self.habits.insert(0, habit.clone());
            }
            CommandOutcome::HabitDeleted { habit_id, .. } => {
                self.habits.retain(|h| h.id != *habit_id);
                self.logs.retain(|l| l.habit_id != *habit_id);
            }
            CommandOutcome::LogToggled(Toggled::Checked(log)) => {
                if !self.is_logged(log.habit_id, log.logged_date) {
                    self.logs.push(log.clone());
                }
            }
            CommandOutcome::LogToggled(Toggled::Unchecked(log)) => {
                self.logs
                    .retain(|l| !(l.habit_id == log.habit_id && l.logged_date == log.logged_date));
            }
        }
    }

    /// Runs one command end to end.
    pub async fn apply(
        &mut self,
        repo: &HabitRepository,
        command: Command,
    ) -> AppResult<CommandOutcome> {
        let ticket = self.begin(command)?;
        let result = repo.execute(self.owner, ticket.command()).await;
        self.settle(ticket, result)
    }

    pub fn is_logged(&self, habit_id: Uuid, date: NaiveDate) -> bool {
        self.logs
            .iter()
            .any(|l| l.habit_id == habit_id && l.logged_date == date)
    }

    pub fn is_pending(&self, habit_id: Uuid, date: NaiveDate) -> bool {
        self.in_flight.contains(&(habit_id, date))
    }

    /// Habits (newest first) against the last `days` dates (oldest first).
    pub fn grid_at(&self, today: NaiveDate, days: u32) -> TrackerGrid {
        let dates = stats::date_range_at(today, days);
        let rows = self
            .habits
            .iter()
            .map(|habit| GridRow {
                habit_id: habit.id,
                name: habit.name.clone(),
                cells: dates
                    .iter()
                    .map(|&date| GridCell {
                        date,
                        done: self.is_logged(habit.id, date),
                        pending: self.is_pending(habit.id, date),
                    })
                    .collect(),
            })
            .collect();

        TrackerGrid { dates, rows }
    }

    pub fn stats_at(&self, today: NaiveDate) -> Vec<HabitStats> {
        stats::summarize_at(today, &self.habits, &self.logs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Days;

    use super::*;
    use crate::store::MemoryStore;

    fn setup() -> (MemoryStore, HabitRepository, Uuid) {
        let store = MemoryStore::new();
        let repo = HabitRepository::new(Arc::new(store.clone()), Duration::from_secs(1));
        (store, repo, Uuid::new_v4())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[tokio::test]
    async fn test_new_user_sees_empty_ready_state() {
        let (_store, repo, owner) = setup();
        let view = TrackerView::open(&repo, owner).await;

        assert_eq!(view.status(), &ViewStatus::Ready);
        assert!(view.grid_at(today(), 7).rows.is_empty());
        assert_eq!(view.grid_at(today(), 7).dates.len(), 7);
        assert!(view.stats_at(today()).is_empty());
        assert!(view.last_error().is_none());
    }

    #[tokio::test]
    async fn test_load_failure_is_visible() {
        let (store, repo, owner) = setup();
        store.set_offline(true);

        let view = TrackerView::open(&repo, owner).await;

        assert!(matches!(view.status(), ViewStatus::Failed(_)));
        assert!(view.last_error().is_some());
    }

    #[tokio::test]
    async fn test_commands_rejected_before_load() {
        let (_store, _repo, owner) = setup();
        let mut view = TrackerView::new(owner);

        let err = view
            .begin(Command::DeleteHabit {
                habit_id: Uuid::new_v4(),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_prepends_store_value() {
        let (_store, repo, owner) = setup();
        let mut view = TrackerView::open(&repo, owner).await;
        repo.create_habit(owner, "Older", None).await.unwrap();
        view.load(&repo).await;

        let outcome = view
            .apply(
                &repo,
                Command::CreateHabit {
                    name: "Drink Water".into(),
                    description: None,
                },
            )
            .await
            .unwrap();

        let CommandOutcome::HabitCreated(created) = outcome else {
            panic!("expected a created habit");
        };
        assert_eq!(view.habits()[0], created);
        assert_eq!(view.habits().len(), 2);
        assert_eq!(repo.list_habits(owner).await.unwrap()[0].id, created.id);
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected_locally() {
        let (_store, repo, owner) = setup();
        let mut view = TrackerView::open(&repo, owner).await;

        let err = view
            .apply(
                &repo,
                Command::CreateHabit {
                    name: "  ".into(),
                    description: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(view.last_error().is_some());
        assert!(repo.list_habits(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_in_flight_blocks_second_toggle() {
        let (_store, repo, owner) = setup();
        let habit = repo.create_habit(owner, "Read", None).await.unwrap();
        let mut view = TrackerView::open(&repo, owner).await;
        let cell = Command::ToggleLog {
            habit_id: habit.id,
            date: today(),
        };

        let ticket = view.begin(cell.clone()).unwrap();
        assert!(view.is_pending(habit.id, today()));
        assert!(view.grid_at(today(), 1).rows[0].cells[0].pending);
        assert!(matches!(view.begin(cell.clone()), Err(AppError::Conflict(_))));

        // Not applied locally until the store confirms.
        assert!(!view.is_logged(habit.id, today()));
        let result = repo.execute(owner, ticket.command()).await;
        view.settle(ticket, result).unwrap();

        assert!(view.is_logged(habit.id, today()));
        assert!(!view.is_pending(habit.id, today()));
    }

    #[tokio::test]
    async fn test_failed_toggle_releases_cell_and_reports() {
        let (store, repo, owner) = setup();
        let habit = repo.create_habit(owner, "Read", None).await.unwrap();
        let mut view = TrackerView::open(&repo, owner).await;
        store.set_offline(true);

        let err = view
            .apply(
                &repo,
                Command::ToggleLog {
                    habit_id: habit.id,
                    date: today(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(!view.is_pending(habit.id, today()));
        assert!(!view.is_logged(habit.id, today()));
        assert!(view.last_error().is_some());
        assert!(view.is_ready());
    }

    #[tokio::test]
    async fn test_toggle_twice_and_delete_cascade_locally() {
        let (_store, repo, owner) = setup();
        let habit = repo.create_habit(owner, "Read", None).await.unwrap();
        let other = repo.create_habit(owner, "Run", None).await.unwrap();
        let mut view = TrackerView::open(&repo, owner).await;
        let yesterday = today() - Days::new(1);

        for (habit_id, date) in [(habit.id, today()), (habit.id, yesterday), (other.id, today())] {
            view.apply(&repo, Command::ToggleLog { habit_id, date })
                .await
                .unwrap();
        }
        assert_eq!(view.stats_at(today())[1].windows[0].percent, 29);

        view.apply(
            &repo,
            Command::ToggleLog {
                habit_id: habit.id,
                date: yesterday,
            },
        )
        .await
        .unwrap();
        assert!(!view.is_logged(habit.id, yesterday));

        view.apply(&repo, Command::DeleteHabit { habit_id: habit.id })
            .await
            .unwrap();
        assert_eq!(view.habits().len(), 1);
        assert!(view.logs().iter().all(|l| l.habit_id == other.id));
        assert_eq!(repo.list_logs(owner).await.unwrap(), view.logs().to_vec());
    }
}
