use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::habit_log::{HabitLog, LogQuery, ToggleRequest, Toggled};
use crate::AppState;

pub async fn list_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<HabitLog>>> {
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::Validation(
                "start_date must not be after end_date".into(),
            ));
        }
    }

    let logs = state.habits.query_logs(auth_user.id, &query).await?;
    Ok(Json(logs))
}

pub async fn toggle_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ToggleRequest>,
) -> AppResult<Json<Toggled>> {
    let toggled = state
        .habits
        .toggle_log(auth_user.id, body.habit_id, body.date)
        .await?;
    Ok(Json(toggled))
}
