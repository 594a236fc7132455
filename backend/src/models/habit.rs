use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A habit row about to be inserted. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl NewHabit {
    /// Trims the name and drops a blank description. An empty name is rejected.
    pub fn new(user_id: Uuid, name: &str, description: Option<&str>) -> AppResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Habit name is required".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Habit name must be at most {MAX_NAME_LEN} characters"
            )));
        }

        Ok(Self {
            user_id,
            name: name.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHabitRequest {
    /// Trimmed and length-checked by [`NewHabit::new`].
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be under 2000 characters"))]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_habit_trims_name() {
        let habit = NewHabit::new(Uuid::new_v4(), "  Drink Water ", Some("  ")).unwrap();
        assert_eq!(habit.name, "Drink Water");
        assert_eq!(habit.description, None);
    }

    #[test]
    fn test_new_habit_rejects_blank_name() {
        let err = NewHabit::new(Uuid::new_v4(), " \t ", None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_padded_name_is_measured_after_trimming() {
        let name = format!("   {}   ", "x".repeat(MAX_NAME_LEN));
        let request = CreateHabitRequest {
            name: name.clone(),
            description: None,
        };
        assert!(request.validate().is_ok());

        let habit = NewHabit::new(Uuid::new_v4(), &name, None).unwrap();
        assert_eq!(habit.name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_new_habit_rejects_long_name() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(NewHabit::new(Uuid::new_v4(), &name, None).is_err());
    }
}
