use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{CatalogEntry, FormData, PropertyPhoto, User};
use crate::error::AppResult;

/// A latitude/longitude pair in WGS 84
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

/// A rental listing as seen by a specific viewer
///
/// `is_favorite` is computed for the acting user and `distance_km` is only
/// present when the query carried a reference location.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Property {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub feature_image: String,
    pub num_bed: i32,
    pub num_bath: i32,
    pub location_name: Option<String>,
    pub price: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub is_enabled: bool,
    pub is_verified: bool,
    pub owner_id: i32,
    pub property_category_id: i32,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_favorite: bool,
    pub distance_km: Option<f64>,
}

impl Property {
    /// Labels pushed to the recommender alongside the item
    pub fn recommender_labels(&self, amenity_ids: &[i32]) -> Vec<String> {
        let mut labels = vec![
            format!("num_bed:{}", self.num_bed),
            format!("num_bath:{}", self.num_bath),
            format!(
                "location:{}",
                self.location_name.as_deref().unwrap_or("None")
            ),
            format!("price:{:?}", self.price),
            format!("category:{}", self.property_category_id),
            format!("user:{}", self.owner_id),
            format!(
                "verified:{}",
                if self.is_verified { "True" } else { "False" }
            ),
        ];
        labels.extend(amenity_ids.iter().map(|id| format!("amenity:{}", id)));
        labels
    }
}

/// Full view returned by `GET /properties/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub property_category: CatalogEntry,
    pub owner: User,
    pub amenities: Vec<CatalogEntry>,
    pub photos: Vec<PropertyPhoto>,
}

/// Multipart file field carrying a listing's feature image
pub const FEATURE_IMAGE_FIELD: &str = "feature_image";

/// Listing fields of `POST /properties` and `PUT /properties/{id}`
///
/// Both endpoints take a multipart form; the feature image travels next to
/// these fields as a file part.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct PropertyInput {
    pub property_category_id: i32,
    #[validate(length(min = 1))]
    pub title: String,
    pub description: String,
    #[validate(range(min = 0))]
    pub num_bed: i32,
    #[validate(range(min = 0))]
    pub num_bath: i32,
    pub location_name: Option<String>,
    /// Rent per month
    #[validate(range(min = 100.0))]
    pub price: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub is_enabled: bool,
    pub is_verified: bool,
}

impl PropertyInput {
    /// Reads and validates the listing fields of a multipart form
    pub fn from_form(form: &FormData) -> AppResult<Self> {
        let input = Self {
            property_category_id: form.required("property_category_id")?,
            title: form.required("title")?,
            description: form.text("description").unwrap_or_default().to_string(),
            num_bed: form.required("num_bed")?,
            num_bath: form.required("num_bath")?,
            location_name: form.text("location_name").map(str::to_string),
            price: form.required_float("price")?,
            latitude: form.required_float("latitude")?,
            longitude: form.required_float("longitude")?,
            is_enabled: form.optional("is_enabled")?.unwrap_or(true),
            is_verified: form.optional("is_verified")?.unwrap_or(false),
        };

        input.validate()?;
        Ok(input)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct PropertyAmenity {
    pub property_id: i32,
    pub amenity_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyAmenityWithAmenity {
    #[serde(flatten)]
    pub link: PropertyAmenity,
    pub amenity: CatalogEntry,
}

/// Body of `POST /properties/{id}/modify_property_amenities`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyAmenityModify {
    #[serde(default)]
    pub added: Option<Vec<i32>>,
    #[serde(default)]
    pub removed: Option<Vec<i32>>,
}
