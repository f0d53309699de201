use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{Pagination, DEFAULT_LIMIT};

/// Query string of the recommendation endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationParams {
    pub category: Option<i32>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl RecommendationParams {
    pub fn window(&self) -> RecommendationWindow {
        let page = Pagination::new(self.skip, self.limit);
        RecommendationWindow {
            category: self.category,
            skip: page.skip,
            limit: page.limit,
        }
    }
}

/// Category filter plus paging sent to the recommender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationWindow {
    pub category: Option<i32>,
    pub skip: i64,
    pub limit: i64,
}

impl Display for RecommendationWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.category {
            Some(category) => write!(f, "{}:{}:{}", category, self.skip, self.limit),
            None => write!(f, "all:{}:{}", self.skip, self.limit),
        }
    }
}

/// One entry of a recommendation list
///
/// Scored lists (latest, popular, neighbors) carry a score; personal
/// recommendations are bare item ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub item_id: String,
    pub score: Option<f64>,
}

/// Wire shape of a recommender list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GorseRecommendation {
    Scored {
        #[serde(rename = "Id")]
        id: String,
        #[serde(rename = "Score")]
        score: f64,
    },
    Bare(String),
}

impl From<GorseRecommendation> for RecommendedItem {
    fn from(entry: GorseRecommendation) -> Self {
        match entry {
            GorseRecommendation::Scored { id, score } => RecommendedItem {
                item_id: id,
                score: Some(score),
            },
            GorseRecommendation::Bare(id) => RecommendedItem {
                item_id: id,
                score: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecommenderUser {
    pub user_id: String,
    pub labels: Vec<String>,
    pub subscribe: Vec<String>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecommenderItem {
    pub item_id: String,
    pub is_hidden: bool,
    pub categories: Vec<String>,
    pub labels: Vec<String>,
    pub timestamp: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecommenderFeedback {
    pub feedback_type: String,
    pub user_id: String,
    pub item_id: String,
    pub timestamp: String,
    pub comment: String,
}

/// Millisecond precision UTC timestamp, e.g. `2022-01-05T07:49:55.578Z`
pub fn recommender_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
