use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::habit_log::HabitLog;
use crate::stats::{self, HabitStats, WindowRate, MAX_WINDOW_DAYS};
use crate::ui::GRID_DAYS;
use crate::view::{TrackerGrid, TrackerView};
use crate::AppState;

/// `today` lets a client anchor windows to its own local date.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub days: Option<u32>,
    pub today: Option<NaiveDate>,
}

impl WindowQuery {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(stats::local_today)
    }

    fn days_or(&self, default: u32) -> AppResult<u32> {
        let days = self.days.unwrap_or(default);
        if days == 0 || days > MAX_WINDOW_DAYS {
            return Err(AppError::Validation(format!(
                "days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        Ok(days)
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub today: NaiveDate,
    pub habits: Vec<HabitStats>,
}

async fn loaded_view(state: &AppState, owner: Uuid) -> AppResult<TrackerView> {
    let habits = state.habits.list_habits(owner).await?;
    let logs = state.habits.list_logs(owner).await?;
    let mut view = TrackerView::new(owner);
    view.finish_load(Ok((habits, logs)));
    Ok(view)
}

pub async fn get_tracker(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<TrackerGrid>> {
    let days = query.days_or(GRID_DAYS)?;
    let view = loaded_view(&state, auth_user.id).await?;
    Ok(Json(view.grid_at(query.today(), days)))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<StatsResponse>> {
    let today = query.today();
    let view = loaded_view(&state, auth_user.id).await?;
    Ok(Json(StatsResponse {
        today,
        habits: view.stats_at(today),
    }))
}

pub async fn get_habit_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(habit_id): Path<Uuid>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<WindowRate>> {
    let days = query.days_or(stats::STAT_WINDOWS[0])?;
    let habit = state.habits.get_habit(auth_user.id, habit_id).await?;
    let logs: Vec<HabitLog> = state
        .habits
        .list_logs(auth_user.id)
        .await?
        .into_iter()
        .filter(|l| l.habit_id == habit.id)
        .collect();

    Ok(Json(stats::window_rate_at(query.today(), habit.id, &logs, days)))
}
