//! Server-rendered pages. They authenticate through the session cookie and
//! redirect to `/login` rather than answering 401.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::{resolve_user, session_token, AuthUser, SESSION_COOKIE};
use crate::error::AppError;
use crate::models::account::{Credentials, SignUpOutcome};
use crate::stats;
use crate::ui::{self, Notice, Tab};
use crate::view::{Command, TrackerView};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub view: Option<String>,
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct HabitForm {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub date: NaiveDate,
}

async fn page_user(state: &AppState, jar: &CookieJar) -> Result<Option<AuthUser>, AppError> {
    resolve_user(state, session_token(None, jar)).await
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.secure_cookies)
        .build()
}

fn login_page_with(status: StatusCode, email: &str, notice: Notice) -> Response {
    (status, Html(ui::render_login(email, Some(&notice)))).into_response()
}

fn tracker_page(status: StatusCode, user: &AuthUser, view: &TrackerView, query: &PageQuery) -> Response {
    let today = query.today.unwrap_or_else(stats::local_today);
    let tab = Tab::parse(query.view.as_deref());
    (status, Html(ui::render_tracker(&user.email, view, today, tab))).into_response()
}

pub async fn index(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let Some(user) = page_user(&state, &jar).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let view = TrackerView::open(&state.habits, user.id).await;
    let status = if view.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(tracker_page(status, &user, &view, &query))
}

pub async fn login_page(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    if page_user(&state, &jar).await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(Html(ui::render_login("", None)).into_response())
}

pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let credentials = Credentials::new(form.email.trim(), form.password);
    let email = credentials.normalized_email();

    let session = match form.action.as_deref() {
        Some("sign_up") => match state.sessions.sign_up(&credentials).await {
            Ok(SignUpOutcome::SignedIn { session }) => Ok(session),
            Ok(SignUpOutcome::ConfirmationRequired {
                message,
                confirmation_token,
                ..
            }) => {
                let link = format!("/confirm?token={confirmation_token}");
                return login_page_with(StatusCode::OK, &email, Notice::Confirm { message, link });
            }
            Err(err) => Err(err),
        },
        _ => state.sessions.sign_in(&credentials).await,
    };

    match session {
        Ok(session) => {
            let jar = jar.add(session_cookie(&state, session.access_token));
            (jar, Redirect::to("/")).into_response()
        }
        Err(err) => {
            tracing::debug!(error = %err, "Login form rejected");
            login_page_with(err.status(), &email, Notice::Error(err.public_message()))
        }
    }
}

/// Target of the confirmation link: completes sign-up and signs the user in.
pub async fn confirm_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ConfirmQuery>,
) -> Response {
    match state.sessions.confirm_email(&query.token).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&state, session.access_token));
            (jar, Redirect::to("/")).into_response()
        }
        Err(err) => {
            tracing::debug!(error = %err, "Confirmation link rejected");
            login_page_with(err.status(), "", Notice::Error(err.public_message()))
        }
    }
}

pub async fn logout_submit(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(None, &jar) {
        if let Err(err) = state.sessions.sign_out(&token).await {
            tracing::debug!(error = %err, "Sign-out of a dead session");
        }
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login")).into_response()
}

async fn run_command(state: &AppState, jar: &CookieJar, command: Command) -> Result<Response, AppError> {
    let Some(user) = page_user(state, jar).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let mut view = TrackerView::open(&state.habits, user.id).await;
    if !view.is_ready() {
        return Ok(tracker_page(
            StatusCode::SERVICE_UNAVAILABLE,
            &user,
            &view,
            &PageQuery::default(),
        ));
    }

    match view.apply(&state.habits, command).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(err) => Ok(tracker_page(err.status(), &user, &view, &PageQuery::default())),
    }
}

pub async fn create_habit_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<HabitForm>,
) -> Result<Response, AppError> {
    let command = Command::CreateHabit {
        name: form.name,
        description: form.description,
    };
    run_command(&state, &jar, command).await
}

pub async fn delete_habit_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(habit_id): Path<Uuid>,
) -> Result<Response, AppError> {
    run_command(&state, &jar, Command::DeleteHabit { habit_id }).await
}

pub async fn toggle_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(habit_id): Path<Uuid>,
    Form(form): Form<ToggleForm>,
) -> Result<Response, AppError> {
    run_command(
        &state,
        &jar,
        Command::ToggleLog {
            habit_id,
            date: form.date,
        },
    )
    .await
}
