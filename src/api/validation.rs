use super::ApiError;
use crate::domain::{RecipeId, UserId};

pub fn validate_recipe_id(id: i32) -> Result<RecipeId, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid recipe ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(RecipeId::new(id))
}

pub fn validate_user_id(id: i32) -> Result<UserId, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid user ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(UserId::new(id))
}

pub fn validate_catalog_id(resource: &str, id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid {} ID: {}. ID must be a positive integer",
            resource, id
        )));
    }
    Ok(id)
}

/// Parses a `0`/`1` style boolean query flag.
pub fn parse_flag(name: &str, value: Option<&str>) -> Result<bool, ApiError> {
    match value.map(str::trim) {
        None | Some("" | "0" | "false") => Ok(false),
        Some("1" | "true") => Ok(true),
        Some(other) => Err(ApiError::validation(format!(
            "Invalid value for {}: '{}'. Expected 0 or 1",
            name, other
        ))),
    }
}
