//! Domain service for the read-only tag and ingredient catalogues and
//! their bulk import.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::types::{IngredientDto, TagDto};
use crate::constants::limits;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Tag {0} not found")]
    TagNotFound(i32),

    #[error("Ingredient {0} not found")]
    IngredientNotFound(i32),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CatalogError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// One entry of an ingredient import file.
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientSeed {
    pub name: String,
    pub measurement_unit: String,
}

/// One entry of a tag import file.
#[derive(Debug, Clone, Deserialize)]
pub struct TagSeed {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub existing: usize,
}

impl IngredientSeed {
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_text("ingredient name", &self.name, limits::MAX_INGREDIENT_NAME_LEN)?;
        check_text(
            "measurement unit",
            &self.measurement_unit,
            limits::MAX_UNIT_LEN,
        )
    }
}

impl TagSeed {
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_text("tag name", &self.name, limits::MAX_TAG_LEN)?;
        check_text("tag slug", &self.slug, limits::MAX_TAG_LEN)?;
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CatalogError::Validation(format!(
                "Tag slug '{}' may only contain letters, digits, '-' and '_'",
                self.slug
            )));
        }
        Ok(())
    }
}

fn check_text(field: &str, value: &str, max: usize) -> Result<(), CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(CatalogError::Validation(format!(
            "{field} must be {max} characters or less"
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<TagDto>, CatalogError>;

    async fn get_tag(&self, id: i32) -> Result<TagDto, CatalogError>;

    /// Ingredients ordered by name, optionally filtered by name prefix.
    async fn search_ingredients(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<IngredientDto>, CatalogError>;

    async fn get_ingredient(&self, id: i32) -> Result<IngredientDto, CatalogError>;

    /// Get-or-create by `(name, unit)`; safe to run repeatedly.
    async fn import_ingredients(
        &self,
        seeds: Vec<IngredientSeed>,
    ) -> Result<ImportSummary, CatalogError>;

    /// Get-or-create by slug; safe to run repeatedly.
    async fn import_tags(&self, seeds: Vec<TagSeed>) -> Result<ImportSummary, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_seed_rules() {
        let ok = TagSeed {
            name: "Breakfast".into(),
            slug: "breakfast".into(),
        };
        assert!(ok.validate().is_ok());

        let bad_slug = TagSeed {
            name: "Breakfast".into(),
            slug: "break fast".into(),
        };
        assert!(bad_slug.validate().is_err());

        let too_long = TagSeed {
            name: "x".repeat(33),
            slug: "x".into(),
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn ingredient_seed_rules() {
        let ok = IngredientSeed {
            name: "абрикосовое варенье".into(),
            measurement_unit: "г".into(),
        };
        assert!(ok.validate().is_ok());

        let blank = IngredientSeed {
            name: " ".into(),
            measurement_unit: "g".into(),
        };
        assert!(blank.validate().is_err());
    }
}
