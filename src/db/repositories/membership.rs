use std::collections::HashSet;

use crate::domain::{ListKind, RecipeId, UserId};
use crate::entities::{prelude::*, recipe_lists};
use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    Set, SqlErr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Favorites and shopping-cart rows, namespaced by [`ListKind`].
pub struct MembershipRepository {
    conn: DatabaseConnection,
}

impl MembershipRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn scoped(user: UserId, kind: ListKind) -> sea_orm::Select<RecipeLists> {
        RecipeLists::find()
            .filter(recipe_lists::Column::UserId.eq(user.value()))
            .filter(recipe_lists::Column::ListKind.eq(kind.as_str()))
    }

    pub async fn contains(&self, user: UserId, recipe: RecipeId, kind: ListKind) -> Result<bool> {
        let count = Self::scoped(user, kind)
            .filter(recipe_lists::Column::RecipeId.eq(recipe.value()))
            .count(&self.conn)
            .await
            .context("Failed to check list membership")?;

        Ok(count > 0)
    }

    /// Inserts the pair unless it is already present. A concurrent insert that
    /// wins the race surfaces as a unique violation and is reported as
    /// [`AddOutcome::Conflict`].
    pub async fn add(&self, user: UserId, recipe: RecipeId, kind: ListKind) -> Result<AddOutcome> {
        if self.contains(user, recipe, kind).await? {
            return Ok(AddOutcome::Conflict);
        }

        let row = recipe_lists::ActiveModel {
            user_id: Set(user.value()),
            recipe_id: Set(recipe.value()),
            list_kind: Set(kind.as_str().to_string()),
            created_at: Set(crate::db::now_timestamp()),
        };

        match RecipeLists::insert(row).exec(&self.conn).await {
            Ok(_) => Ok(AddOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(AddOutcome::Conflict),
            Err(err) => Err(err).context("Failed to insert list membership"),
        }
    }

    pub async fn remove(
        &self,
        user: UserId,
        recipe: RecipeId,
        kind: ListKind,
    ) -> Result<RemoveOutcome> {
        let result = RecipeLists::delete_many()
            .filter(recipe_lists::Column::UserId.eq(user.value()))
            .filter(recipe_lists::Column::RecipeId.eq(recipe.value()))
            .filter(recipe_lists::Column::ListKind.eq(kind.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to delete list membership")?;

        Ok(if result.rows_affected > 0 {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotFound
        })
    }

    /// Which of `recipes` are in the user's list.
    pub async fn members_among(
        &self,
        user: UserId,
        kind: ListKind,
        recipes: &[RecipeId],
    ) -> Result<HashSet<RecipeId>> {
        if recipes.is_empty() {
            return Ok(HashSet::new());
        }

        let ids: Vec<i32> = Self::scoped(user, kind)
            .filter(recipe_lists::Column::RecipeId.is_in(recipes.iter().map(RecipeId::value)))
            .select_only()
            .column(recipe_lists::Column::RecipeId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to load list memberships")?;

        Ok(ids.into_iter().map(RecipeId::new).collect())
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::db::repositories::recipe::{NewIngredientLine, RecipeWrite};
    use crate::db::repositories::user::NewUser;

    async fn seeded() -> (Store, UserId, RecipeId) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let security = crate::config::SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..Default::default()
        };
        let user = store
            .users()
            .create(
                NewUser {
                    email: "cook@example.com".into(),
                    username: "cook".into(),
                    first_name: "A".into(),
                    last_name: "B".into(),
                    password: "password123".into(),
                },
                &security,
            )
            .await
            .unwrap();
        let (tag, _) = store.tags().get_or_create("Soup", "soup").await.unwrap();
        let (salt, _) = store.ingredients().get_or_create("salt", "g").await.unwrap();
        let recipe = store
            .recipes()
            .create(
                UserId::new(user.id),
                RecipeWrite {
                    name: "Broth".into(),
                    text: "Boil".into(),
                    cooking_time: 30,
                    tag_ids: vec![tag.id],
                    ingredients: vec![NewIngredientLine {
                        ingredient_id: salt.id,
                        amount: 5,
                    }],
                },
            )
            .await
            .unwrap();
        (store, UserId::new(user.id), recipe.id)
    }

    #[tokio::test]
    async fn add_twice_is_conflict() {
        let (store, user, recipe) = seeded().await;
        let repo = store.memberships();

        assert_eq!(
            repo.add(user, recipe, ListKind::Favorite).await.unwrap(),
            AddOutcome::Created
        );
        assert_eq!(
            repo.add(user, recipe, ListKind::Favorite).await.unwrap(),
            AddOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn kinds_are_independent() {
        let (store, user, recipe) = seeded().await;
        let repo = store.memberships();

        repo.add(user, recipe, ListKind::Favorite).await.unwrap();
        assert!(
            !repo
                .contains(user, recipe, ListKind::ShoppingCart)
                .await
                .unwrap()
        );
        assert_eq!(
            repo.add(user, recipe, ListKind::ShoppingCart).await.unwrap(),
            AddOutcome::Created
        );
    }

    #[tokio::test]
    async fn remove_absent_is_not_found() {
        let (store, user, recipe) = seeded().await;
        let repo = store.memberships();

        assert_eq!(
            repo.remove(user, recipe, ListKind::ShoppingCart)
                .await
                .unwrap(),
            RemoveOutcome::NotFound
        );

        repo.add(user, recipe, ListKind::ShoppingCart).await.unwrap();
        assert_eq!(
            repo.remove(user, recipe, ListKind::ShoppingCart)
                .await
                .unwrap(),
            RemoveOutcome::Removed
        );
        assert!(
            !repo
                .contains(user, recipe, ListKind::ShoppingCart)
                .await
                .unwrap()
        );
    }
}
