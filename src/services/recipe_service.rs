//! Domain service for recipes and the per-user lists built on them.
//!
//! Covers recipe CRUD, favorites and shopping-cart toggles, shopping-list
//! download and short-link resolution.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::api::types::{RecipeDto, ShortRecipeDto};
use crate::constants::limits;
use crate::domain::{ListKind, RecipeId, UserId};
use crate::shopping_list::ShoppingListError;
use crate::short_link::DecodeError;

/// Errors specific to recipe operations.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe {0} not found")]
    NotFound(RecipeId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Only the author can modify this recipe")]
    Forbidden,

    #[error("Recipe {recipe} is already in your {kind}")]
    AlreadyInList { recipe: RecipeId, kind: &'static str },

    #[error("Recipe {recipe} is not in your {kind}")]
    NotInList { recipe: RecipeId, kind: &'static str },

    #[error(transparent)]
    InvalidLink(#[from] DecodeError),

    #[error(transparent)]
    ShoppingList(#[from] ShoppingListError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for RecipeError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RecipeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IngredientAmount {
    pub id: i32,
    pub amount: i32,
}

/// Body of a recipe create or full update.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeInput {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<i32>,
    pub ingredients: Vec<IngredientAmount>,
}

impl RecipeInput {
    /// Structural checks that need no database access.
    pub fn validate(&self) -> Result<(), RecipeError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(RecipeError::Validation("Recipe name is required".into()));
        }
        if name.chars().count() > limits::MAX_RECIPE_NAME_LEN {
            return Err(RecipeError::Validation(format!(
                "Recipe name must be {} characters or less",
                limits::MAX_RECIPE_NAME_LEN
            )));
        }
        if self.text.trim().is_empty() {
            return Err(RecipeError::Validation("Recipe text is required".into()));
        }
        check_quantity("cooking_time", self.cooking_time)?;

        if self.tags.is_empty() {
            return Err(RecipeError::Validation("At least one tag is required".into()));
        }
        let mut seen = HashSet::with_capacity(self.tags.len());
        if let Some(dup) = self.tags.iter().find(|id| !seen.insert(**id)) {
            return Err(RecipeError::Validation(format!("Duplicate tag: {dup}")));
        }

        if self.ingredients.is_empty() {
            return Err(RecipeError::Validation(
                "At least one ingredient is required".into(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.ingredients.len());
        for item in &self.ingredients {
            if !seen.insert(item.id) {
                return Err(RecipeError::Validation(format!(
                    "Duplicate ingredient: {}",
                    item.id
                )));
            }
            check_quantity("amount", item.amount)?;
        }

        Ok(())
    }
}

fn check_quantity(field: &str, value: i32) -> Result<(), RecipeError> {
    if (limits::MIN_QUANTITY..=limits::MAX_QUANTITY).contains(&value) {
        Ok(())
    } else {
        Err(RecipeError::Validation(format!(
            "{field} must be between {} and {}",
            limits::MIN_QUANTITY,
            limits::MAX_QUANTITY
        )))
    }
}

/// Filters accepted by the recipe listing.
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub tags: Vec<String>,
    pub author: Option<UserId>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub limit: u64,
    pub offset: u64,
}

/// Shopping list ready to be served as a file.
#[derive(Debug, Clone)]
pub struct ShoppingListFile {
    pub filename: String,
    pub content: String,
}

/// Domain service trait for recipes.
#[async_trait::async_trait]
pub trait RecipeService: Send + Sync {
    /// Lists recipes newest first. List filters only apply when `viewer` is set.
    async fn list(
        &self,
        viewer: Option<UserId>,
        query: RecipeQuery,
    ) -> Result<Vec<RecipeDto>, RecipeError>;

    async fn get(&self, viewer: Option<UserId>, id: RecipeId) -> Result<RecipeDto, RecipeError>;

    /// # Errors
    ///
    /// Returns [`RecipeError::Validation`] for malformed input or unknown
    /// tag/ingredient ids. Nothing is written in that case.
    async fn create(&self, author: UserId, input: RecipeInput) -> Result<RecipeDto, RecipeError>;

    /// Replaces the recipe's fields, tags and ingredients.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::Forbidden`] if `actor` is not the author.
    async fn update(
        &self,
        actor: UserId,
        id: RecipeId,
        input: RecipeInput,
    ) -> Result<RecipeDto, RecipeError>;

    async fn delete(&self, actor: UserId, id: RecipeId) -> Result<(), RecipeError>;

    /// Returns the recipe's short-link token, generating it on first use.
    async fn short_link(&self, id: RecipeId) -> Result<String, RecipeError>;

    /// Decodes a short-link token and checks that the recipe exists.
    async fn resolve_short_link(&self, token: &str) -> Result<RecipeId, RecipeError>;

    async fn add_to_list(
        &self,
        user: UserId,
        id: RecipeId,
        kind: ListKind,
    ) -> Result<ShortRecipeDto, RecipeError>;

    async fn remove_from_list(
        &self,
        user: UserId,
        id: RecipeId,
        kind: ListKind,
    ) -> Result<(), RecipeError>;

    /// Aggregates the user's cart into a downloadable shopping list.
    ///
    /// # Errors
    ///
    /// Returns [`ShoppingListError::EmptyCollection`] if the cart is empty.
    async fn shopping_list(&self, user: UserId) -> Result<ShoppingListFile, RecipeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RecipeInput {
        RecipeInput {
            name: "Pancakes".into(),
            text: "Whisk and fry".into(),
            cooking_time: 15,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmount { id: 1, amount: 200 },
                IngredientAmount { id: 2, amount: 2 },
            ],
        }
    }

    #[test]
    fn accepts_well_formed_input() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_ingredients() {
        let mut bad = input();
        bad.ingredients.push(IngredientAmount { id: 1, amount: 5 });
        assert!(matches!(bad.validate(), Err(RecipeError::Validation(m)) if m.contains("Duplicate ingredient")));
    }

    #[test]
    fn rejects_duplicate_tags() {
        let mut bad = input();
        bad.tags = vec![3, 3];
        assert!(matches!(bad.validate(), Err(RecipeError::Validation(_))));
    }

    #[test]
    fn rejects_empty_collections() {
        let mut no_tags = input();
        no_tags.tags.clear();
        assert!(no_tags.validate().is_err());

        let mut no_ingredients = input();
        no_ingredients.ingredients.clear();
        assert!(no_ingredients.validate().is_err());
    }

    #[test]
    fn enforces_quantity_bounds() {
        for cooking_time in [0, -1, 32_001] {
            let mut bad = input();
            bad.cooking_time = cooking_time;
            assert!(bad.validate().is_err(), "cooking_time {cooking_time}");
        }

        let mut edge = input();
        edge.cooking_time = 32_000;
        edge.ingredients[0].amount = 1;
        assert!(edge.validate().is_ok());

        let mut bad = input();
        bad.ingredients[1].amount = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rejects_blank_name_and_text() {
        let mut bad = input();
        bad.name = "   ".into();
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.text = String::new();
        assert!(bad.validate().is_err());

        let mut long = input();
        long.name = "x".repeat(257);
        assert!(long.validate().is_err());
    }
}
