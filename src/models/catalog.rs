use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::FormData;
use crate::error::AppResult;

/// Multipart file field carrying a catalog entry's icon
pub const ICON_FIELD: &str = "icon";

/// Property categories and amenities share one shape and one set of operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Category,
    Amenity,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Category => "property_categories",
            CatalogKind::Amenity => "amenities",
        }
    }

    /// Lower-case name used inside error messages
    pub fn label(&self) -> &'static str {
        match self {
            CatalogKind::Category => "property category",
            CatalogKind::Amenity => "amenity",
        }
    }

    /// Storage folder for uploaded icons
    pub fn icon_folder(&self) -> &'static str {
        match self {
            CatalogKind::Category => "property_category",
            CatalogKind::Amenity => "property_amenity",
        }
    }

    pub fn not_found_message(&self) -> String {
        match self {
            CatalogKind::Category => "Property category not found".to_string(),
            CatalogKind::Amenity => "Amenity not found".to_string(),
        }
    }

    pub fn duplicate_message(&self) -> String {
        format!(
            "The {} with this title already exists in the system",
            self.label()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct CatalogEntry {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Form fields for creating or replacing a category/amenity
///
/// The optional icon is sent as a file part named [`ICON_FIELD`].
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct CatalogInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: String,
}

impl CatalogInput {
    pub fn from_form(form: &FormData) -> AppResult<Self> {
        let input = Self {
            title: form.required("title")?,
            description: form.text("description").unwrap_or_default().to_string(),
        };

        input.validate()?;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_per_kind() {
        assert_eq!(
            CatalogKind::Category.duplicate_message(),
            "The property category with this title already exists in the system"
        );
        assert_eq!(
            CatalogKind::Amenity.duplicate_message(),
            "The amenity with this title already exists in the system"
        );
        assert_eq!(CatalogKind::Amenity.not_found_message(), "Amenity not found");
        assert_eq!(CatalogKind::Category.table(), "property_categories");
        assert_eq!(CatalogKind::Category.icon_folder(), "property_category");
        assert_eq!(CatalogKind::Amenity.icon_folder(), "property_amenity");
    }

    #[test]
    fn test_catalog_input_from_form() {
        let mut form = FormData::default();
        form.push_text("title", " Swimming pool ");
        let input = CatalogInput::from_form(&form).unwrap();
        assert_eq!(input.title, "Swimming pool");
        assert_eq!(input.description, "");

        form.push_text("title", "x".repeat(201));
        let err = CatalogInput::from_form(&form).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(_)));

        let err = CatalogInput::from_form(&FormData::default()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: title is required");
    }
}
