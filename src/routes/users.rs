use axum::{
    extract::State,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::{CurrentUser, PathParam, QueryParams, Superuser, ValidatedJson},
    models::{Pagination, User, UserCreate, UserUpdate, UserUpdateMe},
    services::{ensure_can_manage, users},
    state::AppState,
};

pub async fn list(
    State(state): State<AppState>,
    Superuser(_admin): Superuser,
    QueryParams(page): QueryParams<Pagination>,
) -> AppResult<Json<Vec<User>>> {
    let users = users::get_multi(&state.db, page).await?;
    Ok(Json(users))
}

pub async fn create(
    State(state): State<AppState>,
    Superuser(_admin): Superuser,
    ValidatedJson(input): ValidatedJson<UserCreate>,
) -> AppResult<Json<User>> {
    let user = users::create(&state.db, state.recommender.as_ref(), input).await?;
    Ok(Json(user))
}

/// Self registration, gated by `USERS_OPEN_REGISTRATION`
pub async fn create_open(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<UserCreate>,
) -> AppResult<Json<User>> {
    if !state.config.users_open_registration {
        return Err(AppError::Forbidden(
            "Open user registration is forbidden on this server".to_string(),
        ));
    }

    let user = users::create(
        &state.db,
        state.recommender.as_ref(),
        input.without_privileges(),
    )
    .await?;
    Ok(Json(user))
}

pub async fn read_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(input): ValidatedJson<UserUpdateMe>,
) -> AppResult<Json<User>> {
    let user = users::update_me(&state.db, state.recommender.as_ref(), &user, input).await?;
    Ok(Json(user))
}

pub async fn read_one(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(current): CurrentUser,
) -> AppResult<Json<User>> {
    ensure_can_manage(&current, id)?;
    let user = users::get(&state.db, id).await?;
    Ok(Json(user))
}

pub async fn update(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    Superuser(_admin): Superuser,
    ValidatedJson(input): ValidatedJson<UserUpdate>,
) -> AppResult<Json<User>> {
    let user = users::update(&state.db, state.recommender.as_ref(), id, input).await?;
    Ok(Json(user))
}

pub async fn delete(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    Superuser(_admin): Superuser,
) -> AppResult<Json<User>> {
    let user = users::delete(
        &state.db,
        state.recommender.as_ref(),
        state.storage.as_ref(),
        id,
    )
    .await?;
    Ok(Json(user))
}
