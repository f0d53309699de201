use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct PropertyPhoto {
    pub id: i32,
    pub property_id: i32,
    pub photo: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Body of `POST /properties/{id}/remove_property_photo`
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyPhotoRemove {
    pub id: i32,
}
