use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{Pagination, RecommenderUser, User, UserCreate, UserUpdate, UserUpdateMe},
    services::{
        properties,
        recommender::{report_sync, Recommender},
        storage::{self, FileStorage},
    },
};

pub const USER_NOT_FOUND: &str = "User not found";
const DUPLICATE_EMAIL: &str = "The user with this username already exists in the system";
const DUPLICATE_PHONE: &str = "The user with this phone already exists in the system";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

fn recommender_user(user: &User) -> RecommenderUser {
    RecommenderUser {
        user_id: user.id.to_string(),
        labels: user.recommender_labels(),
        subscribe: Vec::new(),
        comment: String::new(),
    }
}

pub async fn find(db: &PgPool, id: i32) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn get(db: &PgPool, id: i32) -> AppResult<User> {
    find(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))
}

pub async fn get_multi(db: &PgPool, page: Pagination) -> AppResult<Vec<User>> {
    let page = page.normalized();
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id OFFSET $1 LIMIT $2")
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(db)
        .await?;
    Ok(users)
}

/// Rejects an email or phone already held by a user other than `exclude`
async fn ensure_unique(
    db: &PgPool,
    email: Option<&str>,
    phone: Option<&str>,
    exclude: Option<i32>,
) -> AppResult<()> {
    if let Some(email) = email {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users \
             WHERE lower(email) = lower($1) AND ($2::INTEGER IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(db)
        .await?;

        if taken {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
    }

    if let Some(phone) = phone {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users \
             WHERE phone = $1 AND ($2::INTEGER IS NULL OR id <> $2))",
        )
        .bind(phone)
        .bind(exclude)
        .fetch_one(db)
        .await?;

        if taken {
            return Err(AppError::Conflict(DUPLICATE_PHONE.to_string()));
        }
    }

    Ok(())
}

pub async fn create(
    db: &PgPool,
    recommender: &dyn Recommender,
    input: UserCreate,
) -> AppResult<User> {
    ensure_unique(db, Some(&input.email), Some(&input.phone), None).await?;

    let hashed_password = hash_password(&input.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users \
         (first_name, last_name, email, phone, location, hashed_password, \
          is_verified, is_active, is_superuser) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING *",
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.location)
    .bind(&hashed_password)
    .bind(input.is_verified)
    .bind(input.is_active)
    .bind(input.is_superuser)
    .fetch_one(db)
    .await?;

    tracing::info!(user_id = user.id, "User created");

    report_sync(
        "insert_user",
        recommender.insert_user(&recommender_user(&user)).await,
    );

    Ok(user)
}

/// Full update by a superuser; the password is only replaced when given
pub async fn update(
    db: &PgPool,
    recommender: &dyn Recommender,
    id: i32,
    input: UserUpdate,
) -> AppResult<User> {
    let current = get(db, id).await?;
    ensure_unique(db, Some(&input.email), Some(&input.phone), Some(id)).await?;

    let hashed_password = match input.password.as_deref() {
        Some(password) => hash_password(password)?,
        None => current.hashed_password,
    };

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET \
         first_name = $1, last_name = $2, email = $3, phone = $4, location = $5, \
         profile_picture = $6, hashed_password = $7, \
         is_verified = $8, is_active = $9, is_superuser = $10, last_updated = now() \
         WHERE id = $11 \
         RETURNING *",
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.location)
    .bind(&input.profile_picture)
    .bind(&hashed_password)
    .bind(input.is_verified)
    .bind(input.is_active)
    .bind(input.is_superuser)
    .bind(id)
    .fetch_one(db)
    .await?;

    tracing::info!(user_id = id, "User updated");

    report_sync(
        "update_user",
        recommender.update_user(&recommender_user(&user)).await,
    );

    Ok(user)
}

/// Partial self-service update
pub async fn update_me(
    db: &PgPool,
    recommender: &dyn Recommender,
    current: &User,
    input: UserUpdateMe,
) -> AppResult<User> {
    ensure_unique(db, None, input.phone.as_deref(), Some(current.id)).await?;

    let hashed_password = match input.password.as_deref() {
        Some(password) => hash_password(password)?,
        None => current.hashed_password.clone(),
    };

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET \
         first_name = $1, last_name = $2, phone = $3, location = $4, \
         hashed_password = $5, last_updated = now() \
         WHERE id = $6 \
         RETURNING *",
    )
    .bind(input.first_name.as_ref().unwrap_or(&current.first_name))
    .bind(input.last_name.as_ref().unwrap_or(&current.last_name))
    .bind(input.phone.as_ref().unwrap_or(&current.phone))
    .bind(input.location.as_ref().or(current.location.as_ref()))
    .bind(&hashed_password)
    .bind(current.id)
    .fetch_one(db)
    .await?;

    tracing::info!(user_id = user.id, "User updated own profile");

    report_sync(
        "update_user",
        recommender.update_user(&recommender_user(&user)).await,
    );

    Ok(user)
}

/// Deletes a user together with their listings
///
/// Listings are dropped from the recommender and their files discarded once
/// the rows are gone; failures there are only logged.
pub async fn delete(
    db: &PgPool,
    recommender: &dyn Recommender,
    file_storage: &dyn FileStorage,
    id: i32,
) -> AppResult<User> {
    get(db, id).await?;
    let (listing_ids, files) = properties::owned_listings(db, id).await?;

    let user = sqlx::query_as::<_, User>("DELETE FROM users WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

    tracing::info!(user_id = id, listings = listing_ids.len(), "User deleted");

    storage::discard(file_storage, &files).await;
    for listing_id in listing_ids {
        report_sync("remove_item", recommender.remove_item(listing_id).await);
    }
    report_sync("remove_user", recommender.remove_user(id).await);

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    use chrono::Utc;

    #[test]
    fn test_hash_password_round_trips_through_argon2() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse battery", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong", &parsed)
            .is_err());
    }

    #[test]
    fn test_hash_password_is_salted() {
        assert_ne!(
            hash_password("same").unwrap(),
            hash_password("same").unwrap()
        );
    }

    #[test]
    fn test_recommender_user_labels_location() {
        let mut user = User {
            id: 5,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+254700000001".into(),
            profile_picture: None,
            location: Some("Mombasa".into()),
            hashed_password: String::new(),
            is_verified: false,
            is_active: true,
            is_superuser: false,
            created_at: Utc::now(),
            last_updated: None,
        };

        let synced = recommender_user(&user);
        assert_eq!(synced.user_id, "5");
        assert_eq!(synced.labels, vec!["Mombasa".to_string()]);
        assert!(synced.subscribe.is_empty());

        user.location = None;
        assert!(recommender_user(&user).labels.is_empty());
    }
}
