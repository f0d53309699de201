//! Recommendation service abstraction
//!
//! Listings, users and interactions are mirrored to an external recommender
//! which in turn serves ranked item lists. Writes are best effort: callers
//! report failures through [`report_sync`] and carry on.

use crate::{
    error::AppResult,
    models::{
        RecommendationWindow, RecommendedItem, RecommenderFeedback, RecommenderItem,
        RecommenderUser,
    },
};

pub mod gorse;

pub use gorse::GorseRecommender;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Recommender: Send + Sync {
    async fn insert_user(&self, user: &RecommenderUser) -> AppResult<()>;

    async fn update_user(&self, user: &RecommenderUser) -> AppResult<()>;

    async fn remove_user(&self, user_id: i32) -> AppResult<()>;

    async fn insert_item(&self, item: &RecommenderItem) -> AppResult<()>;

    async fn update_item(&self, item: &RecommenderItem) -> AppResult<()>;

    async fn remove_item(&self, item_id: i32) -> AppResult<()>;

    async fn add_item_category(&self, item_id: i32, category: i32) -> AppResult<()>;

    async fn remove_item_category(&self, item_id: i32, category: i32) -> AppResult<()>;

    async fn insert_feedback(&self, feedback: &[RecommenderFeedback]) -> AppResult<()>;

    async fn remove_feedback(
        &self,
        feedback_type: &str,
        user_id: i32,
        item_id: i32,
    ) -> AppResult<()>;

    /// Most recently inserted items
    async fn latest(&self, window: RecommendationWindow) -> AppResult<Vec<RecommendedItem>>;

    /// Items with the most positive feedback
    async fn popular(&self, window: RecommendationWindow) -> AppResult<Vec<RecommendedItem>>;

    /// Personalised recommendations for a user
    async fn recommended(
        &self,
        user_id: i32,
        window: RecommendationWindow,
    ) -> AppResult<Vec<RecommendedItem>>;

    /// Items similar to the given one
    async fn neighbors(
        &self,
        item_id: i32,
        window: RecommendationWindow,
    ) -> AppResult<Vec<RecommendedItem>>;

    /// Recommender name for logging
    fn name(&self) -> &'static str;
}

/// Logs a failed synchronisation without failing the request
pub fn report_sync(operation: &'static str, result: AppResult<()>) {
    if let Err(e) = result {
        tracing::warn!(
            operation = operation,
            error = %e,
            "Recommender synchronisation failed"
        );
    }
}

/// Collapses a failed list read into an empty list so callers can fall back
pub fn list_or_empty(
    operation: &'static str,
    result: AppResult<Vec<RecommendedItem>>,
) -> Vec<RecommendedItem> {
    match result {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(
                operation = operation,
                error = %e,
                "Recommender list unavailable"
            );
            Vec::new()
        }
    }
}
