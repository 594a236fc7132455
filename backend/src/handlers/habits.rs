use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::habit::{CreateHabitRequest, Habit};
use crate::AppState;

pub async fn list_habits(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Habit>>> {
    let habits = state.habits.list_habits(auth_user.id).await?;
    Ok(Json(habits))
}

pub async fn get_habit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(habit_id): Path<Uuid>,
) -> AppResult<Json<Habit>> {
    let habit = state.habits.get_habit(auth_user.id, habit_id).await?;
    Ok(Json(habit))
}

pub async fn create_habit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateHabitRequest>,
) -> AppResult<(StatusCode, Json<Habit>)> {
    body.validate()?;

    let habit = state
        .habits
        .create_habit(auth_user.id, &body.name, body.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(habit)))
}

/// Absent habits are not an error; `deleted` reports whether anything was removed.
pub async fn delete_habit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(habit_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = state.habits.delete_habit(auth_user.id, habit_id).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted, "id": habit_id })))
}
