use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::{json, Value};

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::account::{ConfirmRequest, Credentials, Session, SessionUser, SignUpOutcome};
use crate::AppState;

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> AppResult<(StatusCode, Json<SignUpOutcome>)> {
    let outcome = state.sessions.sign_up(&body).await?;
    let status = match outcome {
        SignUpOutcome::SignedIn { .. } => StatusCode::CREATED,
        SignUpOutcome::ConfirmationRequired { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> AppResult<Json<Session>> {
    let session = state.sessions.sign_in(&body).await?;
    Ok(Json(session))
}

pub async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> AppResult<Json<Session>> {
    let session = state.sessions.confirm_email(&body.token).await?;
    Ok(Json(session))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    state.sessions.sign_out(&auth_user.token).await?;
    Ok(Json(json!({ "message": "Signed out" })))
}

pub async fn me(Extension(auth_user): Extension<AuthUser>) -> Json<SessionUser> {
    Json(SessionUser {
        id: auth_user.id,
        email: auth_user.email,
    })
}
