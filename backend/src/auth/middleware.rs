use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::AppState;

pub const SESSION_COOKIE: &str = "habit_session";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    /// The raw session token, kept so the caller can sign out.
    pub token: String,
}

/// Bearer header first, then the session cookie.
pub fn session_token(
    bearer: Option<&TypedHeader<Authorization<Bearer>>>,
    jar: &CookieJar,
) -> Option<String> {
    bearer
        .map(|TypedHeader(auth)| auth.token().to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty())
}

/// Resolves the caller from a token, or `None` for a missing or dead session.
pub async fn resolve_user(state: &AppState, token: Option<String>) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = token else {
        return Ok(None);
    };

    Ok(state
        .sessions
        .current_user(&token)
        .await?
        .map(|user| AuthUser {
            id: user.id,
            email: user.email,
            token,
        }))
}

pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(bearer.as_ref(), &jar);
    let auth_user = resolve_user(&state, token)
        .await?
        .ok_or(AuthError::Unauthenticated)?;

    req.extensions_mut().insert(auth_user);
    Ok(next.run(req).await)
}
