use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{Feedback, FeedbackType, User},
    services::{
        favorites::recommender_feedback,
        properties,
        recommender::{report_sync, Recommender},
    },
};

/// Records an interaction and mirrors it to the recommender
pub async fn add(
    db: &PgPool,
    recommender: &dyn Recommender,
    user: &User,
    property_id: i32,
    feedback_type: FeedbackType,
) -> AppResult<Feedback> {
    properties::get(db, property_id, user.id).await?;

    let feedback = sqlx::query_as::<_, Feedback>(
        "INSERT INTO feedback (property_id, user_id, feedback_type) VALUES ($1, $2, $3) \
         RETURNING id, property_id, user_id, feedback_type, created_at",
    )
    .bind(property_id)
    .bind(user.id)
    .bind(feedback_type.as_str())
    .fetch_one(db)
    .await?;

    tracing::info!(
        property_id = property_id,
        user_id = user.id,
        feedback_type = %feedback_type,
        "Feedback recorded"
    );

    let synced = recommender_feedback(feedback_type, user, property_id, feedback.created_at);
    report_sync("insert_feedback", recommender.insert_feedback(&[synced]).await);

    Ok(feedback)
}
