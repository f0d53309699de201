use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        recommendation::recommender_timestamp, CatalogEntry, Coordinates, Pagination, Property,
        PropertyDetail, PropertyInput, PropertyQuery, RecommenderItem, SortField, UploadedFile,
        User,
    },
    services::{
        ensure_can_manage, photos,
        recommender::{report_sync, Recommender},
        storage::{self, FileStorage},
        users,
    },
};

pub const PROPERTY_NOT_FOUND: &str = "Property not found";

/// Storage folder for listing feature images
pub const FEATURE_FOLDER: &str = "property_feature";

/// Starts a `SELECT` over `properties p` projecting every [`Property`] column
///
/// `is_favorite` is computed for `viewer`; `distance_km` is measured from
/// `origin` when one is given and NULL otherwise.
fn select_properties(viewer: i32, origin: Option<Coordinates>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT p.id, p.title, p.description, p.feature_image, p.num_bed, p.num_bath, \
         p.location_name, p.price, \
         ST_Y(p.location::geometry) AS latitude, ST_X(p.location::geometry) AS longitude, \
         p.is_enabled, p.is_verified, p.owner_id, p.property_category_id, \
         p.created_at, p.last_updated, \
         EXISTS (SELECT 1 FROM favorites f WHERE f.property_id = p.id AND f.user_id = ",
    );
    qb.push_bind(viewer);
    qb.push(") AS is_favorite, ");

    match origin {
        Some(origin) => {
            qb.push("ST_Distance(p.location, ");
            push_point(&mut qb, origin);
            qb.push(") / 1000.0 AS distance_km");
        }
        None => {
            qb.push("NULL::DOUBLE PRECISION AS distance_km");
        }
    }

    qb.push(" FROM properties p");
    qb
}

fn push_point(qb: &mut QueryBuilder<'static, Postgres>, point: Coordinates) {
    qb.push("ST_SetSRID(ST_MakePoint(");
    qb.push_bind(point.longitude);
    qb.push(", ");
    qb.push_bind(point.latitude);
    qb.push("), 4326)::geography");
}

fn push_range<T>(qb: &mut QueryBuilder<'static, Postgres>, column: &str, min: Option<T>, max: Option<T>)
where
    T: 'static + sqlx::Encode<'static, Postgres> + sqlx::Type<Postgres> + Send,
{
    if let Some(min) = min {
        qb.push(format!(" AND {} >= ", column));
        qb.push_bind(min);
    }
    if let Some(max) = max {
        qb.push(format!(" AND {} <= ", column));
        qb.push_bind(max);
    }
}

fn push_page(qb: &mut QueryBuilder<'static, Postgres>, page: Pagination) {
    let page = page.normalized();
    qb.push(" OFFSET ");
    qb.push_bind(page.skip);
    qb.push(" LIMIT ");
    qb.push_bind(page.limit);
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Price => "p.price",
        SortField::NumBed => "p.num_bed",
        SortField::NumBath => "p.num_bath",
        SortField::CreatedAt => "p.created_at",
        SortField::Distance => "distance_km",
        SortField::Relevance => "relevance",
    }
}

fn push_order(qb: &mut QueryBuilder<'static, Postgres>, query: &PropertyQuery) {
    qb.push(" ORDER BY ");

    for key in &query.sort {
        match key.field {
            SortField::Relevance => {
                qb.push("ts_rank(p.search_vector, plainto_tsquery('english', ");
                qb.push_bind(query.text.clone().unwrap_or_default());
                qb.push("))");
            }
            field => {
                qb.push(sort_column(field));
            }
        }
        qb.push(if key.descending { " DESC, " } else { " ASC, " });
    }

    qb.push("p.id ASC");
}

/// Builds the listing search for a parsed filter
pub fn search_query(query: &PropertyQuery, viewer: i32) -> QueryBuilder<'static, Postgres> {
    let mut qb = select_properties(viewer, query.near.map(|near| near.origin));
    qb.push(" WHERE TRUE");

    if let Some(text) = &query.text {
        qb.push(" AND p.search_vector @@ plainto_tsquery('english', ");
        qb.push_bind(text.clone());
        qb.push(")");
    }

    push_range(&mut qb, "p.num_bed", query.min_bed, query.max_bed);
    push_range(&mut qb, "p.num_bath", query.min_bath, query.max_bath);
    push_range(&mut qb, "p.price", query.min_price, query.max_price);

    if let Some(near) = query.near {
        qb.push(" AND ST_DWithin(p.location, ");
        push_point(&mut qb, near.origin);
        qb.push(", ");
        qb.push_bind(near.radius_km * 1000.0);
        qb.push(")");
    }

    if let Some(is_verified) = query.is_verified {
        qb.push(" AND p.is_verified = ");
        qb.push_bind(is_verified);
    }

    if let Some(is_enabled) = query.is_enabled {
        qb.push(" AND p.is_enabled = ");
        qb.push_bind(is_enabled);
    }

    if !query.categories.is_empty() {
        qb.push(" AND p.property_category_id = ANY(");
        qb.push_bind(query.categories.clone());
        qb.push(")");
    }

    if !query.amenities.is_empty() {
        let mut wanted = query.amenities.clone();
        wanted.sort_unstable();
        wanted.dedup();
        let count = wanted.len() as i64;

        qb.push(
            " AND p.id IN (SELECT pa.property_id FROM property_amenities pa \
             WHERE pa.amenity_id = ANY(",
        );
        qb.push_bind(wanted);
        qb.push(") GROUP BY pa.property_id HAVING COUNT(DISTINCT pa.amenity_id) = ");
        qb.push_bind(count);
        qb.push(")");
    }

    push_order(&mut qb, query);
    push_page(&mut qb, query.page);
    qb
}

/// Runs the listing query pipeline
pub async fn get_multi(
    db: &PgPool,
    query: &PropertyQuery,
    viewer: i32,
) -> AppResult<Vec<Property>> {
    let properties = search_query(query, viewer)
        .build_query_as::<Property>()
        .fetch_all(db)
        .await?;

    tracing::debug!(
        count = properties.len(),
        skip = query.page.skip,
        limit = query.page.limit,
        "Property search"
    );

    Ok(properties)
}

pub async fn find(db: &PgPool, id: i32, viewer: i32) -> AppResult<Option<Property>> {
    let mut qb = select_properties(viewer, None);
    qb.push(" WHERE p.id = ");
    qb.push_bind(id);

    let property = qb.build_query_as::<Property>().fetch_optional(db).await?;
    Ok(property)
}

pub async fn get(db: &PgPool, id: i32, viewer: i32) -> AppResult<Property> {
    find(db, id, viewer)
        .await?
        .ok_or_else(|| AppError::NotFound(PROPERTY_NOT_FOUND.to_string()))
}

/// Loads `ids` in one query and returns them in the same order
///
/// Ids without a matching row are skipped.
pub async fn get_by_ids(db: &PgPool, ids: &[i32], viewer: i32) -> AppResult<Vec<Property>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = select_properties(viewer, None);
    qb.push(" WHERE p.id = ANY(");
    qb.push_bind(ids.to_vec());
    qb.push(")");

    let rows = qb.build_query_as::<Property>().fetch_all(db).await?;
    let mut by_id: HashMap<i32, Property> = rows.into_iter().map(|p| (p.id, p)).collect();

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub async fn get_detail(db: &PgPool, id: i32, viewer: i32) -> AppResult<PropertyDetail> {
    let property = get(db, id, viewer).await?;

    let property_category = sqlx::query_as::<_, CatalogEntry>(
        "SELECT id, title, description, icon, created_at, last_updated \
         FROM property_categories WHERE id = $1",
    )
    .bind(property.property_category_id)
    .fetch_one(db)
    .await?;

    let owner = users::get(db, property.owner_id).await?;
    let amenities = amenities(db, id).await?;
    let photos = photos::list(db, id).await?;

    Ok(PropertyDetail {
        property,
        property_category,
        owner,
        amenities,
        photos,
    })
}

/// Listings owned by `owner_id`, newest first
pub async fn get_multi_by_owner(
    db: &PgPool,
    owner_id: i32,
    page: Pagination,
) -> AppResult<Vec<Property>> {
    let mut qb = select_properties(owner_id, None);
    qb.push(" WHERE p.owner_id = ");
    qb.push_bind(owner_id);
    qb.push(" ORDER BY p.created_at DESC, p.id ASC");
    push_page(&mut qb, page);

    let properties = qb.build_query_as::<Property>().fetch_all(db).await?;
    Ok(properties)
}

/// Listings favourited by `user_id`, most recent favourite first
pub async fn get_favorite_by_owner(
    db: &PgPool,
    user_id: i32,
    page: Pagination,
) -> AppResult<Vec<Property>> {
    let mut qb = select_properties(user_id, None);
    qb.push(" JOIN favorites fav ON fav.property_id = p.id WHERE fav.user_id = ");
    qb.push_bind(user_id);
    qb.push(" ORDER BY fav.created_at DESC, p.id ASC");
    push_page(&mut qb, page);

    let properties = qb.build_query_as::<Property>().fetch_all(db).await?;
    Ok(properties)
}

/// Amenities linked to a listing, in link order
pub async fn amenities(db: &PgPool, property_id: i32) -> AppResult<Vec<CatalogEntry>> {
    let amenities = sqlx::query_as::<_, CatalogEntry>(
        "SELECT a.id, a.title, a.description, a.icon, a.created_at, a.last_updated \
         FROM amenities a \
         JOIN property_amenities pa ON pa.amenity_id = a.id \
         WHERE pa.property_id = $1 \
         ORDER BY pa.created_at, a.id",
    )
    .bind(property_id)
    .fetch_all(db)
    .await?;

    Ok(amenities)
}

pub async fn amenity_ids(db: &PgPool, property_id: i32) -> AppResult<Vec<i32>> {
    let ids = sqlx::query_scalar::<_, i32>(
        "SELECT amenity_id FROM property_amenities WHERE property_id = $1 ORDER BY amenity_id",
    )
    .bind(property_id)
    .fetch_all(db)
    .await?;

    Ok(ids)
}

async fn ensure_category_exists(db: &PgPool, category_id: i32) -> AppResult<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM property_categories WHERE id = $1)")
            .bind(category_id)
            .fetch_one(db)
            .await?;

    if !exists {
        return Err(AppError::NotFound(
            "Property Category not found".to_string(),
        ));
    }
    Ok(())
}

/// Item record mirrored to the recommender
///
/// Linked amenities double as the item's categories.
pub fn recommender_item(
    property: &Property,
    amenity_ids: &[i32],
    comment: String,
    at: DateTime<Utc>,
) -> RecommenderItem {
    RecommenderItem {
        item_id: property.id.to_string(),
        is_hidden: !property.is_enabled,
        categories: amenity_ids.iter().map(ToString::to_string).collect(),
        labels: property.recommender_labels(amenity_ids),
        timestamp: recommender_timestamp(at),
        comment,
    }
}

pub async fn create(
    db: &PgPool,
    recommender: &dyn Recommender,
    file_storage: &dyn FileStorage,
    owner: &User,
    input: PropertyInput,
    feature_image: UploadedFile,
) -> AppResult<Property> {
    ensure_category_exists(db, input.property_category_id).await?;

    let feature_url = storage::store(file_storage, FEATURE_FOLDER, feature_image).await?;

    let inserted = sqlx::query_scalar::<_, i32>(
        "INSERT INTO properties \
         (title, description, feature_image, num_bed, num_bath, location_name, price, \
          location, is_enabled, is_verified, owner_id, property_category_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, \
          ST_SetSRID(ST_MakePoint($8, $9), 4326)::geography, $10, $11, $12, $13) \
         RETURNING id",
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&feature_url)
    .bind(input.num_bed)
    .bind(input.num_bath)
    .bind(&input.location_name)
    .bind(input.price)
    .bind(input.longitude)
    .bind(input.latitude)
    .bind(input.is_enabled)
    .bind(input.is_verified && owner.is_superuser)
    .bind(owner.id)
    .bind(input.property_category_id)
    .fetch_one(db)
    .await;

    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            storage::discard(file_storage, &[feature_url]).await;
            return Err(e.into());
        }
    };

    let property = get(db, id, owner.id).await?;

    tracing::info!(
        property_id = id,
        owner_id = owner.id,
        "Property created"
    );

    let item = recommender_item(
        &property,
        &[],
        format!("Created by {}", owner.id),
        property.created_at,
    );
    report_sync("insert_item", recommender.insert_item(&item).await);

    Ok(property)
}

/// Replaces a listing's fields; a new feature image supersedes the stored one
pub async fn update(
    db: &PgPool,
    recommender: &dyn Recommender,
    file_storage: &dyn FileStorage,
    user: &User,
    id: i32,
    input: PropertyInput,
    feature_image: Option<UploadedFile>,
) -> AppResult<Property> {
    let current = get(db, id, user.id).await?;
    ensure_can_manage(user, current.owner_id)?;
    ensure_category_exists(db, input.property_category_id).await?;

    let is_verified = if user.is_superuser {
        input.is_verified
    } else {
        current.is_verified
    };
    let replaced_url = match feature_image {
        Some(file) => Some(storage::store(file_storage, FEATURE_FOLDER, file).await?),
        None => None,
    };
    let feature_url = replaced_url
        .clone()
        .unwrap_or_else(|| current.feature_image.clone());

    let updated = sqlx::query(
        "UPDATE properties SET \
         title = $1, description = $2, feature_image = $3, num_bed = $4, num_bath = $5, \
         location_name = $6, price = $7, \
         location = ST_SetSRID(ST_MakePoint($8, $9), 4326)::geography, \
         is_enabled = $10, is_verified = $11, property_category_id = $12, \
         last_updated = now() \
         WHERE id = $13",
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&feature_url)
    .bind(input.num_bed)
    .bind(input.num_bath)
    .bind(&input.location_name)
    .bind(input.price)
    .bind(input.longitude)
    .bind(input.latitude)
    .bind(input.is_enabled)
    .bind(is_verified)
    .bind(input.property_category_id)
    .bind(id)
    .execute(db)
    .await;

    if let Err(e) = updated {
        if let Some(url) = replaced_url {
            storage::discard(file_storage, &[url]).await;
        }
        return Err(e.into());
    }
    if replaced_url.is_some() {
        storage::discard(file_storage, &[current.feature_image]).await;
    }

    let property = get(db, id, user.id).await?;
    let amenity_ids = amenity_ids(db, id).await?;

    tracing::info!(property_id = id, user_id = user.id, "Property updated");

    let item = recommender_item(
        &property,
        &amenity_ids,
        format!("Updated by {}", user.id),
        property.last_updated.unwrap_or_else(Utc::now),
    );
    report_sync("update_item", recommender.update_item(&item).await);

    Ok(property)
}

/// URLs of the feature image and every photo of the listings matching `filter`
async fn stored_files(db: &PgPool, filter: &str, id: i32) -> AppResult<Vec<String>> {
    let urls = sqlx::query_scalar::<_, String>(&format!(
        "SELECT p.feature_image FROM properties p WHERE {filter} \
         UNION ALL \
         SELECT ph.photo FROM property_photos ph \
         JOIN properties p ON p.id = ph.property_id WHERE {filter}"
    ))
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(urls)
}

/// Ids and stored file URLs of every listing owned by `owner_id`
pub async fn owned_listings(db: &PgPool, owner_id: i32) -> AppResult<(Vec<i32>, Vec<String>)> {
    let ids = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM properties WHERE owner_id = $1 ORDER BY id",
    )
    .bind(owner_id)
    .fetch_all(db)
    .await?;
    let files = stored_files(db, "p.owner_id = $1", owner_id).await?;

    Ok((ids, files))
}

/// Deletes a listing and everything hanging off it, returning the removed row
///
/// Stored files go after the rows; a failed file delete is only logged.
pub async fn delete(
    db: &PgPool,
    recommender: &dyn Recommender,
    file_storage: &dyn FileStorage,
    user: &User,
    id: i32,
) -> AppResult<Property> {
    let property = get(db, id, user.id).await?;
    ensure_can_manage(user, property.owner_id)?;

    let files = stored_files(db, "p.id = $1", id).await?;

    sqlx::query("DELETE FROM properties WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;

    tracing::info!(property_id = id, user_id = user.id, "Property deleted");

    storage::discard(file_storage, &files).await;
    report_sync("remove_item", recommender.remove_item(id).await);

    Ok(property)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{property_filter::GeoRadius, SortKey};

    fn nairobi() -> Coordinates {
        Coordinates {
            latitude: -1.286389,
            longitude: 36.817223,
        }
    }

    fn sample_property() -> Property {
        Property {
            id: 12,
            title: "Garden flat".into(),
            description: "Quiet".into(),
            feature_image: "http://localhost/a.png".into(),
            num_bed: 2,
            num_bath: 1,
            location_name: Some("Kilimani".into()),
            price: 1500.0,
            latitude: -1.29,
            longitude: 36.78,
            is_enabled: false,
            is_verified: true,
            owner_id: 3,
            property_category_id: 4,
            created_at: Utc::now(),
            last_updated: None,
            is_favorite: false,
            distance_km: None,
        }
    }

    #[test]
    fn test_default_search_sql() {
        let qb = search_query(&PropertyQuery::default(), 7);
        let sql = qb.sql();

        assert!(sql.starts_with("SELECT p.id, p.title"));
        assert!(sql.contains("f.user_id = $1) AS is_favorite"));
        assert!(sql.contains("NULL::DOUBLE PRECISION AS distance_km"));
        assert!(sql.contains("WHERE TRUE AND p.is_enabled = $2"));
        assert!(sql.contains("ORDER BY p.created_at DESC, p.id ASC"));
        assert!(sql.ends_with("OFFSET $3 LIMIT $4"));
        assert!(!sql.contains("search_vector"));
        assert!(!sql.contains("ST_DWithin"));
    }

    #[test]
    fn test_text_search_and_relevance_order() {
        let query = PropertyQuery {
            text: Some("garden flat".into()),
            sort: vec![SortKey::desc(SortField::Relevance)],
            ..PropertyQuery::default()
        };
        let qb = search_query(&query, 1);
        let sql = qb.sql();

        assert!(sql.contains("AND p.search_vector @@ plainto_tsquery('english', $2)"));
        assert!(sql.contains(
            "ORDER BY ts_rank(p.search_vector, plainto_tsquery('english', $4)) DESC, p.id ASC"
        ));
    }

    #[test]
    fn test_ranges_and_flags() {
        let query = PropertyQuery {
            min_bed: Some(1),
            max_bath: Some(2),
            min_price: Some(500.0),
            max_price: Some(2000.0),
            is_verified: Some(true),
            is_enabled: None,
            ..PropertyQuery::default()
        };
        let qb = search_query(&query, 1);
        let sql = qb.sql();

        assert!(sql.contains("AND p.num_bed >= $2"));
        assert!(!sql.contains("p.num_bed <="));
        assert!(sql.contains("AND p.num_bath <= $3"));
        assert!(sql.contains("AND p.price >= $4 AND p.price <= $5"));
        assert!(sql.contains("AND p.is_verified = $6"));
        assert!(!sql.contains("p.is_enabled ="));
    }

    #[test]
    fn test_radius_filter_and_distance_sort() {
        let query = PropertyQuery {
            near: Some(GeoRadius {
                origin: nairobi(),
                radius_km: 5.0,
            }),
            sort: vec![SortKey::asc(SortField::Distance), SortKey::desc(SortField::Price)],
            ..PropertyQuery::default()
        };
        let qb = search_query(&query, 1);
        let sql = qb.sql();

        assert!(sql.contains(
            "ST_Distance(p.location, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography) / 1000.0 AS distance_km"
        ));
        assert!(sql.contains(
            "AND ST_DWithin(p.location, ST_SetSRID(ST_MakePoint($4, $5), 4326)::geography, $6)"
        ));
        assert!(sql.contains("ORDER BY distance_km ASC, p.price DESC, p.id ASC"));
    }

    #[test]
    fn test_category_and_amenity_membership() {
        let query = PropertyQuery {
            categories: vec![1, 2],
            amenities: vec![5, 4, 5],
            is_enabled: None,
            ..PropertyQuery::default()
        };
        let qb = search_query(&query, 1);
        let sql = qb.sql();

        assert!(sql.contains("AND p.property_category_id = ANY($2)"));
        assert!(sql.contains(
            "AND p.id IN (SELECT pa.property_id FROM property_amenities pa WHERE pa.amenity_id = ANY($3) \
             GROUP BY pa.property_id HAVING COUNT(DISTINCT pa.amenity_id) = $4)"
        ));
    }

    #[test]
    fn test_recommender_item_uses_amenities_as_categories() {
        let property = sample_property();
        let at = Utc::now();
        let item = recommender_item(&property, &[8, 9], "Created by 3".into(), at);

        assert_eq!(item.item_id, "12");
        assert!(item.is_hidden);
        assert_eq!(item.categories, vec!["8".to_string(), "9".to_string()]);
        assert_eq!(item.labels.last().map(String::as_str), Some("amenity:9"));
        assert_eq!(item.timestamp, recommender_timestamp(at));
        assert_eq!(item.comment, "Created by 3");
    }

    #[test]
    fn test_sort_columns() {
        assert_eq!(sort_column(SortField::NumBed), "p.num_bed");
        assert_eq!(sort_column(SortField::Distance), "distance_km");
    }
}
