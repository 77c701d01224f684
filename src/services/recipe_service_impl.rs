//! `SeaORM` implementation of the `RecipeService` trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::info;

use crate::api::types::{RecipeDto, RecipeIngredientDto, ShortRecipeDto, TagDto, UserDto};
use crate::db::{
    AddOutcome, NewIngredientLine, RecipeFilter, RecipeRow, RecipeWrite, RemoveOutcome, Store,
};
use crate::domain::{ListKind, RecipeId, UserId};
use crate::services::recipe_service::{
    RecipeError, RecipeInput, RecipeQuery, RecipeService, ShoppingListFile,
};
use crate::{shopping_list, short_link};

pub struct SeaOrmRecipeService {
    store: Store,
}

impl SeaOrmRecipeService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn require(&self, id: RecipeId) -> Result<RecipeRow, RecipeError> {
        self.store
            .recipes()
            .get(id)
            .await?
            .ok_or(RecipeError::NotFound(id))
    }

    /// Checks that every referenced tag and ingredient exists and converts
    /// the payload into a repository write.
    async fn resolve_write(&self, input: RecipeInput) -> Result<RecipeWrite, RecipeError> {
        input.validate()?;

        let tags = self.store.tags().get_by_ids(&input.tags).await?;
        if tags.len() != input.tags.len() {
            let known: HashSet<i32> = tags.iter().map(|t| t.id).collect();
            let missing: Vec<String> = input
                .tags
                .iter()
                .filter(|id| !known.contains(id))
                .map(ToString::to_string)
                .collect();
            return Err(RecipeError::Validation(format!(
                "Unknown tag ids: {}",
                missing.join(", ")
            )));
        }

        let ingredient_ids: Vec<i32> = input.ingredients.iter().map(|i| i.id).collect();
        let ingredients = self.store.ingredients().get_by_ids(&ingredient_ids).await?;
        if ingredients.len() != ingredient_ids.len() {
            let known: HashSet<i32> = ingredients.iter().map(|i| i.id).collect();
            let missing: Vec<String> = ingredient_ids
                .iter()
                .filter(|id| !known.contains(id))
                .map(ToString::to_string)
                .collect();
            return Err(RecipeError::Validation(format!(
                "Unknown ingredient ids: {}",
                missing.join(", ")
            )));
        }

        Ok(RecipeWrite {
            name: input.name.trim().to_string(),
            text: input.text,
            cooking_time: input.cooking_time,
            tag_ids: input.tags,
            ingredients: input
                .ingredients
                .into_iter()
                .map(|i| NewIngredientLine {
                    ingredient_id: i.id,
                    amount: i.amount,
                })
                .collect(),
        })
    }

    /// Attaches authors, tags, ingredients and the viewer's flags.
    async fn hydrate(
        &self,
        viewer: Option<UserId>,
        rows: Vec<RecipeRow>,
    ) -> Result<Vec<RecipeDto>, RecipeError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<RecipeId> = rows.iter().map(|r| r.id).collect();
        let raw_ids: Vec<i32> = ids.iter().map(RecipeId::value).collect();

        let mut author_ids: Vec<UserId> = rows.iter().map(|r| r.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let raw_author_ids: Vec<i32> = author_ids.iter().map(UserId::value).collect();

        let authors: HashMap<i32, _> = self
            .store
            .users()
            .get_by_ids(&raw_author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut tags: HashMap<RecipeId, Vec<TagDto>> = HashMap::new();
        for (recipe_id, tag) in self.store.tags().for_recipes(&raw_ids).await? {
            tags.entry(RecipeId::new(recipe_id))
                .or_default()
                .push(TagDto::from(tag));
        }

        let mut lines = self.store.recipes().lines_for(&ids).await?;

        let (favorites, cart, followed) = match viewer {
            Some(user) => {
                let memberships = self.store.memberships();
                (
                    memberships
                        .members_among(user, ListKind::Favorite, &ids)
                        .await?,
                    memberships
                        .members_among(user, ListKind::ShoppingCart, &ids)
                        .await?,
                    self.store
                        .subscriptions()
                        .following_among(user, &author_ids)
                        .await?,
                )
            }
            None => (HashSet::new(), HashSet::new(), HashSet::new()),
        };

        rows.into_iter()
            .map(|row| {
                let author = authors.get(&row.author_id.value()).cloned().ok_or_else(|| {
                    RecipeError::Internal(format!(
                        "Author {} of recipe {} is missing",
                        row.author_id, row.id
                    ))
                })?;

                Ok(RecipeDto {
                    id: row.id,
                    tags: tags.remove(&row.id).unwrap_or_default(),
                    author: UserDto::from_user(author, followed.contains(&row.author_id)),
                    ingredients: lines
                        .remove(&row.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(RecipeIngredientDto::from)
                        .collect(),
                    is_favorited: favorites.contains(&row.id),
                    is_in_shopping_cart: cart.contains(&row.id),
                    name: row.name,
                    text: row.text,
                    cooking_time: row.cooking_time,
                    pub_date: row.pub_date,
                })
            })
            .collect()
    }

    async fn hydrate_one(
        &self,
        viewer: Option<UserId>,
        row: RecipeRow,
    ) -> Result<RecipeDto, RecipeError> {
        let id = row.id;
        self.hydrate(viewer, vec![row])
            .await?
            .pop()
            .ok_or(RecipeError::NotFound(id))
    }
}

#[async_trait]
impl RecipeService for SeaOrmRecipeService {
    async fn list(
        &self,
        viewer: Option<UserId>,
        query: RecipeQuery,
    ) -> Result<Vec<RecipeDto>, RecipeError> {
        let mut in_lists = Vec::new();
        if let Some(user) = viewer {
            if query.is_favorited {
                in_lists.push((user, ListKind::Favorite));
            }
            if query.is_in_shopping_cart {
                in_lists.push((user, ListKind::ShoppingCart));
            }
        }

        let filter = RecipeFilter {
            tag_slugs: query.tags,
            author: query.author,
            in_lists,
            limit: query.limit,
            offset: query.offset,
        };

        let rows = self.store.recipes().list(&filter).await?;
        self.hydrate(viewer, rows).await
    }

    async fn get(&self, viewer: Option<UserId>, id: RecipeId) -> Result<RecipeDto, RecipeError> {
        let row = self.require(id).await?;
        self.hydrate_one(viewer, row).await
    }

    async fn create(&self, author: UserId, input: RecipeInput) -> Result<RecipeDto, RecipeError> {
        let write = self.resolve_write(input).await?;
        let row = self.store.recipes().create(author, write).await?;
        self.hydrate_one(Some(author), row).await
    }

    async fn update(
        &self,
        actor: UserId,
        id: RecipeId,
        input: RecipeInput,
    ) -> Result<RecipeDto, RecipeError> {
        let existing = self.require(id).await?;
        if existing.author_id != actor {
            return Err(RecipeError::Forbidden);
        }

        let write = self.resolve_write(input).await?;
        let row = self
            .store
            .recipes()
            .update(id, write)
            .await?
            .ok_or(RecipeError::NotFound(id))?;

        self.hydrate_one(Some(actor), row).await
    }

    async fn delete(&self, actor: UserId, id: RecipeId) -> Result<(), RecipeError> {
        let existing = self.require(id).await?;
        if existing.author_id != actor {
            return Err(RecipeError::Forbidden);
        }

        if !self.store.recipes().delete(id).await? {
            return Err(RecipeError::NotFound(id));
        }

        info!(recipe_id = id.value(), author_id = actor.value(), "Recipe deleted");
        Ok(())
    }

    async fn short_link(&self, id: RecipeId) -> Result<String, RecipeError> {
        let row = self.require(id).await?;
        if let Some(token) = row.short_link {
            return Ok(token);
        }

        self.store
            .recipes()
            .set_short_link_if_absent(id, &short_link::encode(id))
            .await?
            .ok_or(RecipeError::NotFound(id))
    }

    async fn resolve_short_link(&self, token: &str) -> Result<RecipeId, RecipeError> {
        let id = short_link::decode(token)?;
        if self.store.recipes().exists(id).await? {
            Ok(id)
        } else {
            Err(RecipeError::NotFound(id))
        }
    }

    async fn add_to_list(
        &self,
        user: UserId,
        id: RecipeId,
        kind: ListKind,
    ) -> Result<ShortRecipeDto, RecipeError> {
        let row = self.require(id).await?;

        match self.store.memberships().add(user, id, kind).await? {
            AddOutcome::Created => {
                info!(
                    recipe_id = id.value(),
                    user_id = user.value(),
                    list = kind.as_str(),
                    "Recipe added to list"
                );
                Ok(ShortRecipeDto::from(row))
            }
            AddOutcome::Conflict => Err(RecipeError::AlreadyInList {
                recipe: id,
                kind: kind.label(),
            }),
        }
    }

    async fn remove_from_list(
        &self,
        user: UserId,
        id: RecipeId,
        kind: ListKind,
    ) -> Result<(), RecipeError> {
        if !self.store.recipes().exists(id).await? {
            return Err(RecipeError::NotFound(id));
        }

        match self.store.memberships().remove(user, id, kind).await? {
            RemoveOutcome::Removed => Ok(()),
            RemoveOutcome::NotFound => Err(RecipeError::NotInList {
                recipe: id,
                kind: kind.label(),
            }),
        }
    }

    async fn shopping_list(&self, user: UserId) -> Result<ShoppingListFile, RecipeError> {
        let account = self
            .store
            .users()
            .get_by_id(user.value())
            .await?
            .ok_or_else(|| RecipeError::Internal(format!("User {user} not found")))?;

        let cart = self.store.recipes().cart_contents(user).await?;
        let items = shopping_list::aggregate(&cart)?;

        Ok(ShoppingListFile {
            filename: format!("{}_shopping_list.txt", account.username),
            content: shopping_list::render(&items),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::db::NewUser;
    use crate::entities::{prelude::Recipes, recipes};
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, sea_query::Expr};

    async fn stored_recipe(store: &Store) -> RecipeId {
        let security = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..Default::default()
        };
        let author = store
            .users()
            .create(
                NewUser {
                    email: "chef@example.com".into(),
                    username: "chef".into(),
                    first_name: "Chef".into(),
                    last_name: "Test".into(),
                    password: "password123".into(),
                },
                &security,
            )
            .await
            .unwrap();
        let (tag, _) = store.tags().get_or_create("Dinner", "dinner").await.unwrap();
        let (egg, _) = store.ingredients().get_or_create("egg", "pc").await.unwrap();

        store
            .recipes()
            .create(
                UserId::new(author.id),
                RecipeWrite {
                    name: "Omelette".into(),
                    text: "Whisk and fry".into(),
                    cooking_time: 10,
                    tag_ids: vec![tag.id],
                    ingredients: vec![NewIngredientLine {
                        ingredient_id: egg.id,
                        amount: 3,
                    }],
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn short_link_fills_missing_token() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let id = stored_recipe(&store).await;

        Recipes::update_many()
            .col_expr(recipes::Column::ShortLink, Expr::value(Option::<String>::None))
            .filter(recipes::Column::Id.eq(id.value()))
            .exec(&store.conn)
            .await
            .unwrap();
        let cleared = store.recipes().get(id).await.unwrap().unwrap();
        assert_eq!(cleared.short_link, None);

        let service = SeaOrmRecipeService::new(store.clone());
        let token = service.short_link(id).await.unwrap();
        assert_eq!(token, short_link::encode(id));

        let persisted = store.recipes().get(id).await.unwrap().unwrap();
        assert_eq!(persisted.short_link, Some(token.clone()));
        assert_eq!(service.short_link(id).await.unwrap(), token);
    }

    #[tokio::test]
    async fn short_link_for_missing_recipe_is_not_found() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let service = SeaOrmRecipeService::new(store);

        let err = service.short_link(RecipeId::new(42)).await.unwrap_err();
        assert!(matches!(err, RecipeError::NotFound(_)), "{err:?}");
    }
}
