use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Property;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Favorite {
    pub property_id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A favorite together with the listing it points at
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteWithProperty {
    #[serde(flatten)]
    pub favorite: Favorite,
    pub property: Property,
}
