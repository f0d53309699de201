use crate::{
    error::{AppError, AppResult},
    models::User,
};

pub mod catalog;
pub mod favorites;
pub mod feedback;
pub mod photos;
pub mod properties;
pub mod property_amenities;
pub mod recommendations;
pub mod recommender;
pub mod storage;
pub mod users;

pub const NOT_ENOUGH_PERMISSIONS: &str = "Not enough permissions";

/// Allows the owner of a resource or any superuser
pub fn ensure_can_manage(user: &User, owner_id: i32) -> AppResult<()> {
    if user.can_manage(owner_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(NOT_ENOUGH_PERMISSIONS.to_string()))
    }
}

/// Allows superusers only
pub fn ensure_superuser(user: &User) -> AppResult<()> {
    if user.is_superuser {
        Ok(())
    } else {
        Err(AppError::Forbidden(NOT_ENOUGH_PERMISSIONS.to_string()))
    }
}
