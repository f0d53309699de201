use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A user account
///
/// The password hash is loaded from the database but never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq)]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub profile_picture: Option<String>,
    pub location: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl User {
    /// Owners manage their own resources; superusers manage everything
    pub fn can_manage(&self, owner_id: i32) -> bool {
        self.is_superuser || self.id == owner_id
    }

    /// Labels pushed to the recommender alongside the user
    pub fn recommender_labels(&self) -> Vec<String> {
        self.location.iter().cloned().collect()
    }
}

/// Body of `POST /users` and `POST /users/open`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserCreate {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3))]
    pub phone: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub location: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

fn default_active() -> bool {
    true
}

impl UserCreate {
    /// Drops the privileged flags a self-registering user may not set
    pub fn without_privileges(self) -> Self {
        Self {
            is_verified: false,
            is_active: true,
            is_superuser: false,
            ..self
        }
    }
}

/// Body of `PUT /users/{id}` (superuser only)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3))]
    pub phone: String,
    #[validate(length(min = 8))]
    pub password: Option<String>,
    pub location: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Body of `PUT /users/me`; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdateMe {
    #[validate(length(min = 8))]
    pub password: Option<String>,
    #[validate(length(min = 1))]
    pub first_name: Option<String>,
    #[validate(length(min = 1))]
    pub last_name: Option<String>,
    #[validate(length(min = 3))]
    pub phone: Option<String>,
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_create() -> UserCreate {
        serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "phone": "+254700000001",
            "password": "analytical-engine",
            "is_superuser": true,
            "is_verified": true,
            "is_active": false
        }))
        .unwrap()
    }

    #[test]
    fn test_user_create_defaults() {
        let user: UserCreate = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "phone": "+254700000001",
            "password": "analytical-engine"
        }))
        .unwrap();
        assert!(user.is_active);
        assert!(!user.is_superuser);
        assert!(!user.is_verified);
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_user_create_rejects_bad_email_and_short_password() {
        let mut user = sample_create();
        user.email = "not-an-email".to_string();
        user.password = "short".to_string();
        let errors = user.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_without_privileges_resets_flags() {
        let user = sample_create().without_privileges();
        assert!(!user.is_superuser);
        assert!(!user.is_verified);
        assert!(user.is_active);
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: 1,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+254700000001".into(),
            profile_picture: None,
            location: Some("Nairobi".into()),
            hashed_password: "$argon2id$secret".into(),
            is_verified: false,
            is_active: true,
            is_superuser: false,
            created_at: Utc::now(),
            last_updated: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["location"], "Nairobi");

        assert!(user.can_manage(1));
        assert!(!user.can_manage(2));
        assert_eq!(user.recommender_labels(), vec!["Nairobi".to_string()]);
    }
}
