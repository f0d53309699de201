use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Kinds of user interaction recorded against a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackType {
    Click,
    View,
    Favorite,
    Read,
    Call,
    Text,
    Map,
    Share,
}

impl FeedbackType {
    /// Stored (upper-case) form
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Click => "CLICK",
            FeedbackType::View => "VIEW",
            FeedbackType::Favorite => "FAVORITE",
            FeedbackType::Read => "READ",
            FeedbackType::Call => "CALL",
            FeedbackType::Text => "TEXT",
            FeedbackType::Map => "MAP",
            FeedbackType::Share => "SHARE",
        }
    }

    /// Form the recommender expects
    pub fn recommender_name(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CLICK" => Ok(FeedbackType::Click),
            "VIEW" => Ok(FeedbackType::View),
            "FAVORITE" => Ok(FeedbackType::Favorite),
            "READ" => Ok(FeedbackType::Read),
            "CALL" => Ok(FeedbackType::Call),
            "TEXT" => Ok(FeedbackType::Text),
            "MAP" => Ok(FeedbackType::Map),
            "SHARE" => Ok(FeedbackType::Share),
            other => Err(format!("Unknown feedback type: {}", other)),
        }
    }
}

/// Body of `POST /properties/{id}/add_feedback`
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackInput {
    pub feedback_type: FeedbackType,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Feedback {
    pub id: i32,
    pub property_id: i32,
    pub user_id: i32,
    pub feedback_type: String,
    pub created_at: DateTime<Utc>,
}
