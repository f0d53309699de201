use serde::Deserialize;

pub mod catalog;
pub mod favorite;
pub mod feedback;
pub mod form;
pub mod photo;
pub mod property;
pub mod property_filter;
pub mod recommendation;
pub mod user;

pub use catalog::{CatalogEntry, CatalogInput, CatalogKind, ICON_FIELD};
pub use favorite::{Favorite, FavoriteWithProperty};
pub use feedback::{Feedback, FeedbackInput, FeedbackType};
pub use form::{FormData, UploadedFile};
pub use photo::{PropertyPhoto, PropertyPhotoRemove};
pub use property::{
    Coordinates, Property, PropertyAmenity, PropertyAmenityModify, PropertyAmenityWithAmenity,
    PropertyDetail, PropertyInput, FEATURE_IMAGE_FIELD,
};
pub use property_filter::{PropertyFilter, PropertyQuery, SortField, SortKey};
pub use recommendation::{
    RecommendationParams, RecommendationWindow, RecommendedItem, RecommenderFeedback,
    RecommenderItem, RecommenderUser,
};
pub use user::{User, UserCreate, UserUpdate, UserUpdateMe};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 100;

/// `skip`/`limit` window accepted by every list endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }.normalized()
    }

    /// Clamps `skip` to be non-negative and `limit` to `1..=MAX_LIMIT`
    pub fn normalized(self) -> Self {
        Self {
            skip: self.skip.max(0),
            limit: self.limit.clamp(1, MAX_LIMIT),
        }
    }
}
