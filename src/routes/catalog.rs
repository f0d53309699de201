//! Handlers shared by `/property_categories` and `/amenities`
//!
//! Each router carries its [`Catalog`] as an extension.

use axum::{extract::State, Extension, Json};

use crate::{
    error::AppResult,
    middleware::{CurrentUser, MultipartForm, PathParam, QueryParams, Superuser},
    models::{CatalogEntry, CatalogInput, Pagination, ICON_FIELD},
    services::catalog::Catalog,
    state::AppState,
};

pub async fn list(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    CurrentUser(_user): CurrentUser,
    QueryParams(page): QueryParams<Pagination>,
) -> AppResult<Json<Vec<CatalogEntry>>> {
    let entries = catalog.list(&state.db, page).await?;
    Ok(Json(entries))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    PathParam(id): PathParam<i32>,
    CurrentUser(_user): CurrentUser,
) -> AppResult<Json<CatalogEntry>> {
    let entry = catalog.get(&state.db, id).await?;
    Ok(Json(entry))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    Superuser(_admin): Superuser,
    MultipartForm(mut form): MultipartForm,
) -> AppResult<Json<CatalogEntry>> {
    let input = CatalogInput::from_form(&form)?;
    let icon = form.take_file(ICON_FIELD);
    let entry = catalog
        .create(&state.db, state.storage.as_ref(), input, icon)
        .await?;
    Ok(Json(entry))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    PathParam(id): PathParam<i32>,
    Superuser(_admin): Superuser,
    MultipartForm(mut form): MultipartForm,
) -> AppResult<Json<CatalogEntry>> {
    let input = CatalogInput::from_form(&form)?;
    let icon = form.take_file(ICON_FIELD);
    let entry = catalog
        .update(&state.db, state.storage.as_ref(), id, input, icon)
        .await?;
    Ok(Json(entry))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    PathParam(id): PathParam<i32>,
    Superuser(_admin): Superuser,
) -> AppResult<Json<CatalogEntry>> {
    let entry = catalog.delete(&state.db, state.storage.as_ref(), id).await?;
    Ok(Json(entry))
}
