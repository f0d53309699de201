use axum::{extract::State, Json};

use crate::{
    error::{AppError, AppResult},
    middleware::{CurrentUser, JsonBody, MultipartForm, PathParam, QueryParams},
    models::{
        FavoriteWithProperty, Feedback, FeedbackInput, Pagination, Property,
        PropertyAmenityModify, PropertyAmenityWithAmenity, PropertyDetail, PropertyFilter,
        PropertyInput, PropertyPhoto, PropertyPhotoRemove, RecommendationParams,
        FEATURE_IMAGE_FIELD,
    },
    services::{
        favorites, feedback, photos, properties, property_amenities,
        recommendations::{self, RecommendationList},
    },
    state::AppState,
};

/// Multipart field holding listing photos
const PHOTOS_FIELD: &str = "photos";

/// Handler for `GET /properties`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(filter): QueryParams<PropertyFilter>,
) -> AppResult<Json<Vec<Property>>> {
    let query = filter.parse()?;
    let properties = properties::get_multi(&state.db, &query, user.id).await?;
    Ok(Json(properties))
}

pub async fn list_mine(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(page): QueryParams<Pagination>,
) -> AppResult<Json<Vec<Property>>> {
    let properties = properties::get_multi_by_owner(&state.db, user.id, page).await?;
    Ok(Json(properties))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(page): QueryParams<Pagination>,
) -> AppResult<Json<Vec<Property>>> {
    let properties = properties::get_favorite_by_owner(&state.db, user.id, page).await?;
    Ok(Json(properties))
}

async fn recommend(
    state: &AppState,
    user_id: i32,
    list: RecommendationList,
    params: &RecommendationParams,
) -> AppResult<Json<Vec<Property>>> {
    let properties = recommendations::recommend(
        &state.db,
        state.recommender.as_ref(),
        list,
        params,
        user_id,
    )
    .await?;
    Ok(Json(properties))
}

pub async fn latest(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(params): QueryParams<RecommendationParams>,
) -> AppResult<Json<Vec<Property>>> {
    recommend(&state, user.id, RecommendationList::Latest, &params).await
}

pub async fn popular(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(params): QueryParams<RecommendationParams>,
) -> AppResult<Json<Vec<Property>>> {
    recommend(&state, user.id, RecommendationList::Popular, &params).await
}

pub async fn recommended(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(params): QueryParams<RecommendationParams>,
) -> AppResult<Json<Vec<Property>>> {
    let list = RecommendationList::Recommended { user_id: user.id };
    recommend(&state, user.id, list, &params).await
}

pub async fn similar(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
    QueryParams(params): QueryParams<RecommendationParams>,
) -> AppResult<Json<Vec<Property>>> {
    let list = RecommendationList::Similar { property_id: id };
    recommend(&state, user.id, list, &params).await
}

pub async fn get_one(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<PropertyDetail>> {
    let detail = properties::get_detail(&state.db, id, user.id).await?;
    Ok(Json(detail))
}

/// Handler for the multipart `POST /properties`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    MultipartForm(mut form): MultipartForm,
) -> AppResult<Json<Property>> {
    let input = PropertyInput::from_form(&form)?;
    let feature_image = form.take_file(FEATURE_IMAGE_FIELD).ok_or_else(|| {
        AppError::InvalidInput(format!("{} is required", FEATURE_IMAGE_FIELD))
    })?;

    let property = properties::create(
        &state.db,
        state.recommender.as_ref(),
        state.storage.as_ref(),
        &user,
        input,
        feature_image,
    )
    .await?;
    Ok(Json(property))
}

/// Handler for the multipart `PUT /properties/{id}`; `feature_image` is optional
pub async fn update(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
    MultipartForm(mut form): MultipartForm,
) -> AppResult<Json<Property>> {
    let input = PropertyInput::from_form(&form)?;
    let feature_image = form.take_file(FEATURE_IMAGE_FIELD);

    let property = properties::update(
        &state.db,
        state.recommender.as_ref(),
        state.storage.as_ref(),
        &user,
        id,
        input,
        feature_image,
    )
    .await?;
    Ok(Json(property))
}

pub async fn delete(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Property>> {
    let property = properties::delete(
        &state.db,
        state.recommender.as_ref(),
        state.storage.as_ref(),
        &user,
        id,
    )
    .await?;
    Ok(Json(property))
}

pub async fn modify_amenities(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
    JsonBody(changes): JsonBody<PropertyAmenityModify>,
) -> AppResult<Json<Vec<PropertyAmenityWithAmenity>>> {
    let linked =
        property_amenities::modify(&state.db, state.recommender.as_ref(), &user, id, changes)
            .await?;
    Ok(Json(linked))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<FavoriteWithProperty>> {
    let favorite = favorites::add(&state.db, state.recommender.as_ref(), &user, id).await?;
    Ok(Json(favorite))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<FavoriteWithProperty>> {
    let favorite = favorites::remove(&state.db, state.recommender.as_ref(), &user, id).await?;
    Ok(Json(favorite))
}

pub async fn add_feedback(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
    JsonBody(input): JsonBody<FeedbackInput>,
) -> AppResult<Json<Feedback>> {
    let recorded = feedback::add(
        &state.db,
        state.recommender.as_ref(),
        &user,
        id,
        input.feedback_type,
    )
    .await?;
    Ok(Json(recorded))
}

pub async fn list_photos(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<PropertyPhoto>>> {
    properties::get(&state.db, id, user.id).await?;
    let photos = photos::list(&state.db, id).await?;
    Ok(Json(photos))
}

/// Handler for the multipart `POST /properties/{id}/add_property_photos`
///
/// Only parts named `photos` are stored; other parts are ignored.
pub async fn add_photos(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
    MultipartForm(mut form): MultipartForm,
) -> AppResult<Json<Vec<PropertyPhoto>>> {
    let files = form.take_files(PHOTOS_FIELD);
    let photos = photos::add(&state.db, state.storage.as_ref(), &user, id, files).await?;
    Ok(Json(photos))
}

pub async fn remove_photo(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    CurrentUser(user): CurrentUser,
    JsonBody(input): JsonBody<PropertyPhotoRemove>,
) -> AppResult<Json<PropertyPhoto>> {
    let photo = photos::remove(&state.db, state.storage.as_ref(), &user, id, input.id).await?;
    Ok(Json(photo))
}

