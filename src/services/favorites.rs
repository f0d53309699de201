use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{
        recommendation::recommender_timestamp, Favorite, FavoriteWithProperty, FeedbackType,
        RecommenderFeedback, User,
    },
    services::{
        properties,
        recommender::{report_sync, Recommender},
    },
};

/// Single feedback record attributed to `user`
pub fn recommender_feedback(
    feedback_type: FeedbackType,
    user: &User,
    property_id: i32,
    at: DateTime<Utc>,
) -> RecommenderFeedback {
    RecommenderFeedback {
        feedback_type: feedback_type.recommender_name(),
        user_id: user.id.to_string(),
        item_id: property_id.to_string(),
        timestamp: recommender_timestamp(at),
        comment: format!("Created by {}", user.id),
    }
}

pub async fn add(
    db: &PgPool,
    recommender: &dyn Recommender,
    user: &User,
    property_id: i32,
) -> AppResult<FavoriteWithProperty> {
    properties::get(db, property_id, user.id).await?;

    let favorite = sqlx::query_as::<_, Favorite>(
        "INSERT INTO favorites (property_id, user_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING \
         RETURNING property_id, user_id, created_at, last_updated",
    )
    .bind(property_id)
    .bind(user.id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::Conflict("The favorite already exists".to_string()))?;

    tracing::info!(property_id = property_id, user_id = user.id, "Favorite added");

    let feedback = recommender_feedback(FeedbackType::Favorite, user, property_id, favorite.created_at);
    report_sync("insert_feedback", recommender.insert_feedback(&[feedback]).await);

    let property = properties::get(db, property_id, user.id).await?;
    Ok(FavoriteWithProperty { favorite, property })
}

pub async fn remove(
    db: &PgPool,
    recommender: &dyn Recommender,
    user: &User,
    property_id: i32,
) -> AppResult<FavoriteWithProperty> {
    properties::get(db, property_id, user.id).await?;

    let favorite = sqlx::query_as::<_, Favorite>(
        "DELETE FROM favorites WHERE property_id = $1 AND user_id = $2 \
         RETURNING property_id, user_id, created_at, last_updated",
    )
    .bind(property_id)
    .bind(user.id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("The favorite does not exist".to_string()))?;

    tracing::info!(property_id = property_id, user_id = user.id, "Favorite removed");

    report_sync(
        "remove_feedback",
        recommender
            .remove_feedback(
                &FeedbackType::Favorite.recommender_name(),
                user.id,
                property_id,
            )
            .await,
    );

    let property = properties::get(db, property_id, user.id).await?;
    Ok(FavoriteWithProperty { favorite, property })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_recommender_feedback_shape() {
        let user = User {
            id: 9,
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.com".into(),
            phone: "+254700000002".into(),
            profile_picture: None,
            location: None,
            hashed_password: String::new(),
            is_verified: true,
            is_active: true,
            is_superuser: false,
            created_at: Utc::now(),
            last_updated: None,
        };
        let at = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();

        let feedback = recommender_feedback(FeedbackType::Share, &user, 44, at);

        assert_eq!(feedback.feedback_type, "share");
        assert_eq!(feedback.user_id, "9");
        assert_eq!(feedback.item_id, "44");
        assert_eq!(feedback.timestamp, "2023-03-01T12:00:00.000Z");
        assert_eq!(feedback.comment, "Created by 9");
    }
}
