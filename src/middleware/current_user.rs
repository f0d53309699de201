use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    error::{AppError, AppResult},
    models::User,
    services::{ensure_superuser, users},
    state::AppState,
};

/// Header carrying the acting user's id, set by the upstream gateway
pub const USER_ID_HEADER: &str = "x-user-id";

/// The active user making the request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// An active superuser making the request
#[derive(Debug, Clone)]
pub struct Superuser(pub User);

fn user_id_from_headers(parts: &Parts) -> AppResult<i32> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<i32>().ok())
        .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let user_id = user_id_from_headers(parts)?;
        let user = users::get(&state.db, user_id).await?;

        if !user.is_active {
            return Err(AppError::InvalidInput("Inactive user".to_string()));
        }

        tracing::Span::current().record("user_id", user_id);

        Ok(CurrentUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Superuser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        ensure_superuser(&user)?;
        Ok(Superuser(user))
    }
}
