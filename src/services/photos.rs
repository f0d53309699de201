use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{PropertyPhoto, UploadedFile, User},
    services::{
        ensure_can_manage, properties,
        storage::{self, FileStorage},
    },
};

/// Storage folder for listing photos
pub const PHOTO_FOLDER: &str = "property_photo";

pub async fn list(db: &PgPool, property_id: i32) -> AppResult<Vec<PropertyPhoto>> {
    let photos = sqlx::query_as::<_, PropertyPhoto>(
        "SELECT id, property_id, photo, created_at, last_updated \
         FROM property_photos WHERE property_id = $1 ORDER BY id",
    )
    .bind(property_id)
    .fetch_all(db)
    .await?;
    Ok(photos)
}

/// Stores every file and records one photo row per file
pub async fn add(
    db: &PgPool,
    file_storage: &dyn FileStorage,
    user: &User,
    property_id: i32,
    files: Vec<UploadedFile>,
) -> AppResult<Vec<PropertyPhoto>> {
    if files.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one photo is required".to_string(),
        ));
    }

    let property = properties::get(db, property_id, user.id).await?;
    ensure_can_manage(user, property.owner_id)?;

    let urls = storage::store_all(file_storage, PHOTO_FOLDER, files).await?;

    let mut photos = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        let inserted = sqlx::query_as::<_, PropertyPhoto>(
            "INSERT INTO property_photos (property_id, photo) VALUES ($1, $2) \
             RETURNING id, property_id, photo, created_at, last_updated",
        )
        .bind(property_id)
        .bind(url)
        .fetch_one(db)
        .await;

        match inserted {
            Ok(photo) => photos.push(photo),
            Err(e) => {
                storage::discard(file_storage, &urls[index..]).await;
                return Err(e.into());
            }
        }
    }

    tracing::info!(
        property_id = property_id,
        count = photos.len(),
        "Property photos added"
    );

    Ok(photos)
}

/// Deletes a photo row, then its file on a best effort basis
pub async fn remove(
    db: &PgPool,
    file_storage: &dyn FileStorage,
    user: &User,
    property_id: i32,
    photo_id: i32,
) -> AppResult<PropertyPhoto> {
    let property = properties::get(db, property_id, user.id).await?;
    ensure_can_manage(user, property.owner_id)?;

    let photo = sqlx::query_as::<_, PropertyPhoto>(
        "DELETE FROM property_photos WHERE id = $1 AND property_id = $2 \
         RETURNING id, property_id, photo, created_at, last_updated",
    )
    .bind(photo_id)
    .bind(property_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("The property_photo does not exist".to_string()))?;

    storage::discard(file_storage, std::slice::from_ref(&photo.photo)).await;

    tracing::info!(property_id = property_id, photo_id = photo_id, "Property photo removed");

    Ok(photo)
}
