use std::collections::HashSet;

use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{Property, PropertyQuery, RecommendationParams, RecommendationWindow, RecommendedItem},
    services::{
        properties,
        recommender::{list_or_empty, Recommender},
    },
};

/// Which recommendation list to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationList {
    Latest,
    Popular,
    /// Personal recommendations, falling back to latest
    Recommended { user_id: i32 },
    /// Neighbours of a listing, falling back to latest
    Similar { property_id: i32 },
}

/// Orders a recommender list into property ids
///
/// Scored entries are ranked by descending score; ties and bare ids keep the
/// recommender's order. Ids that are not integers are dropped, as are repeats.
pub fn rank_item_ids(mut items: Vec<RecommendedItem>) -> Vec<i32> {
    items.sort_by(|a, b| {
        let a = a.score.unwrap_or(f64::NEG_INFINITY);
        let b = b.score.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| item.item_id.trim().parse::<i32>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Walks the recommender fallback chain for `list` and returns ranked ids
///
/// An empty result means no recommender list was available.
pub async fn recommended_ids(
    recommender: &dyn Recommender,
    list: RecommendationList,
    window: RecommendationWindow,
) -> Vec<i32> {
    let primary = match list {
        RecommendationList::Latest => list_or_empty("latest", recommender.latest(window).await),
        RecommendationList::Popular => {
            list_or_empty("popular", recommender.popular(window).await)
        }
        RecommendationList::Recommended { user_id } => list_or_empty(
            "recommended",
            recommender.recommended(user_id, window).await,
        ),
        RecommendationList::Similar { property_id } => list_or_empty(
            "neighbors",
            recommender.neighbors(property_id, window).await,
        ),
    };

    let items = match list {
        RecommendationList::Recommended { .. } | RecommendationList::Similar { .. }
            if primary.is_empty() =>
        {
            list_or_empty("latest", recommender.latest(window).await)
        }
        _ => primary,
    };

    rank_item_ids(items)
}

/// Serves a recommendation list as properties seen by `viewer`
///
/// When the recommender has nothing usable the default listing query is
/// served instead, restricted to the requested amenity category.
pub async fn recommend(
    db: &PgPool,
    recommender: &dyn Recommender,
    list: RecommendationList,
    params: &RecommendationParams,
    viewer: i32,
) -> AppResult<Vec<Property>> {
    if let RecommendationList::Similar { property_id } = list {
        properties::get(db, property_id, viewer).await?;
    }

    let window = params.window();
    let ids = recommended_ids(recommender, list, window).await;

    if !ids.is_empty() {
        let resolved = properties::get_by_ids(db, &ids, viewer).await?;
        if !resolved.is_empty() {
            return Ok(resolved);
        }
        tracing::debug!(
            recommender = recommender.name(),
            "Recommended ids no longer resolve to properties"
        );
    }

    tracing::debug!(list = ?list, "Serving default listing query");

    let mut query = PropertyQuery::paged(window.skip, window.limit);
    query.amenities = window.category.into_iter().collect();
    properties::get_multi(db, &query, viewer).await
}
