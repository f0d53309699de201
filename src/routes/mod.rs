use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware},
    services::catalog::{Catalog, AMENITIES, CATEGORIES},
    state::AppState,
};

pub mod catalog;
pub mod properties;
pub mod users;

/// Upper bound for request bodies, sized for multipart image uploads
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .nest_service("/uploads", uploads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(property_routes())
        .merge(user_routes())
        .merge(catalog_routes("/property_categories", CATEGORIES))
        .merge(catalog_routes("/amenities", AMENITIES))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn property_routes() -> Router<AppState> {
    Router::new()
        .route("/properties", get(properties::list).post(properties::create))
        .route("/properties/me", get(properties::list_mine))
        .route("/properties/favorites", get(properties::list_favorites))
        .route("/properties/latest", get(properties::latest))
        .route("/properties/popular", get(properties::popular))
        .route("/properties/recommended", get(properties::recommended))
        .route(
            "/properties/:id",
            get(properties::get_one)
                .put(properties::update)
                .delete(properties::delete),
        )
        .route("/properties/:id/similar", get(properties::similar))
        .route(
            "/properties/:id/modify_property_amenities",
            post(properties::modify_amenities),
        )
        .route("/properties/:id/add_favorite", post(properties::add_favorite))
        .route(
            "/properties/:id/remove_favorite",
            post(properties::remove_favorite),
        )
        .route("/properties/:id/add_feedback", post(properties::add_feedback))
        .route("/properties/:id/photos", get(properties::list_photos))
        .route(
            "/properties/:id/add_property_photos",
            post(properties::add_photos),
        )
        .route(
            "/properties/:id/remove_property_photo",
            post(properties::remove_photo),
        )
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list).post(users::create))
        .route("/users/open", post(users::create_open))
        .route("/users/me", get(users::read_me).put(users::update_me))
        .route(
            "/users/:id",
            get(users::read_one).put(users::update).delete(users::delete),
        )
}

/// CRUD routes for one catalog mounted at `prefix`
fn catalog_routes(prefix: &str, kind: Catalog) -> Router<AppState> {
    Router::new()
        .route(prefix, get(catalog::list).post(catalog::create))
        .route(
            &format!("{}/:id", prefix),
            get(catalog::get_one)
                .put(catalog::update)
                .delete(catalog::delete),
        )
        .layer(Extension(kind))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
