use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogEntry, PropertyAmenity, PropertyAmenityModify, PropertyAmenityWithAmenity, User},
    services::{
        ensure_can_manage, properties,
        recommender::{report_sync, Recommender},
    },
};

/// Adds and removes amenity links of a listing in one transaction
///
/// Returns the requested links (existing or new) with their amenity. The
/// recommender only hears about links that actually changed, after commit.
pub async fn modify(
    db: &PgPool,
    recommender: &dyn Recommender,
    user: &User,
    property_id: i32,
    changes: PropertyAmenityModify,
) -> AppResult<Vec<PropertyAmenityWithAmenity>> {
    let property = properties::get(db, property_id, user.id).await?;
    ensure_can_manage(user, property.owner_id)?;

    let mut tx = db.begin().await?;
    let mut linked = Vec::new();
    let mut created = Vec::new();
    let mut deleted = Vec::new();

    for amenity_id in changes.added.unwrap_or_default() {
        let amenity = sqlx::query_as::<_, CatalogEntry>(
            "SELECT id, title, description, icon, created_at, last_updated \
             FROM amenities WHERE id = $1",
        )
        .bind(amenity_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Some amenities to create not found with id {}",
                amenity_id
            ))
        })?;

        let existing = sqlx::query_as::<_, PropertyAmenity>(
            "SELECT property_id, amenity_id, created_at FROM property_amenities \
             WHERE property_id = $1 AND amenity_id = $2",
        )
        .bind(property_id)
        .bind(amenity_id)
        .fetch_optional(&mut *tx)
        .await?;

        let link = match existing {
            Some(link) => link,
            None => {
                let link = sqlx::query_as::<_, PropertyAmenity>(
                    "INSERT INTO property_amenities (property_id, amenity_id) VALUES ($1, $2) \
                     RETURNING property_id, amenity_id, created_at",
                )
                .bind(property_id)
                .bind(amenity_id)
                .fetch_one(&mut *tx)
                .await?;
                created.push(amenity_id);
                link
            }
        };

        linked.push(PropertyAmenityWithAmenity { link, amenity });
    }

    for amenity_id in changes.removed.unwrap_or_default() {
        let removed = sqlx::query(
            "DELETE FROM property_amenities WHERE property_id = $1 AND amenity_id = $2",
        )
        .bind(property_id)
        .bind(amenity_id)
        .execute(&mut *tx)
        .await?;

        if removed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Some property amenities to delete not found with key {}",
                amenity_id
            )));
        }
        deleted.push(amenity_id);
    }

    tx.commit().await?;

    tracing::info!(
        property_id = property_id,
        added = created.len(),
        removed = deleted.len(),
        "Property amenities modified"
    );

    for amenity_id in created {
        report_sync(
            "add_item_category",
            recommender.add_item_category(property_id, amenity_id).await,
        );
    }
    for amenity_id in deleted {
        report_sync(
            "remove_item_category",
            recommender.remove_item_category(property_id, amenity_id).await,
        );
    }

    Ok(linked)
}
