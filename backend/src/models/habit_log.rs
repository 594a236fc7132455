use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One completed day for a habit. `logged_date` is a calendar date and
/// serializes as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HabitLog {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub user_id: Uuid,
    pub logged_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Result of flipping a (habit, date) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "log", rename_all = "lowercase")]
pub enum Toggled {
    /// A log was created.
    Checked(HabitLog),
    /// The existing log was removed.
    Unchecked(HabitLog),
}

impl Toggled {
    pub fn log(&self) -> &HabitLog {
        match self {
            Toggled::Checked(log) | Toggled::Unchecked(log) => log,
        }
    }

    pub fn is_checked(&self) -> bool {
        matches!(self, Toggled::Checked(_))
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LogQuery {
    pub habit_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl LogQuery {
    pub fn matches(&self, log: &HabitLog) -> bool {
        self.habit_id.map_or(true, |id| log.habit_id == id)
            && self.start_date.map_or(true, |start| log.logged_date >= start)
            && self.end_date.map_or(true, |end| log.logged_date <= end)
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub habit_id: Uuid,
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_on(habit_id: Uuid, date: NaiveDate) -> HabitLog {
        HabitLog {
            id: Uuid::new_v4(),
            habit_id,
            user_id: Uuid::new_v4(),
            logged_date: date,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_log_query_bounds_are_inclusive() {
        let habit = Uuid::new_v4();
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let query = LogQuery {
            habit_id: Some(habit),
            start_date: Some(start),
            end_date: Some(end),
        };

        assert!(query.matches(&log_on(habit, start)));
        assert!(query.matches(&log_on(habit, end)));
        assert!(!query.matches(&log_on(habit, end.succ_opt().unwrap())));
        assert!(!query.matches(&log_on(Uuid::new_v4(), start)));
    }

    #[test]
    fn test_toggled_serializes_action_and_log() {
        let log = log_on(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let value = serde_json::to_value(Toggled::Checked(log)).unwrap();
        assert_eq!(value["action"], "checked");
        assert_eq!(value["log"]["logged_date"], "2026-01-05");
    }
}
