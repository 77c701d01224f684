use std::collections::HashMap;

use crate::domain::{ListKind, RecipeId, UserId};
use crate::entities::{
    ingredients, prelude::*, recipe_ingredients, recipe_lists, recipe_tags, recipes, tags,
};
use crate::shopping_list::{CartRecipe, IngredientLine};
use crate::short_link;
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set, TransactionTrait,
};
use tracing::{debug, info};

/// A stored recipe without its tag and ingredient collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRow {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub short_link: Option<String>,
    pub pub_date: String,
}

impl From<recipes::Model> for RecipeRow {
    fn from(m: recipes::Model) -> Self {
        Self {
            id: RecipeId::new(m.id),
            author_id: UserId::new(m.author_id),
            name: m.name,
            text: m.text,
            cooking_time: m.cooking_time,
            short_link: m.short_link,
            pub_date: m.pub_date,
        }
    }
}

/// Ingredient line joined with its catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredientRow {
    pub ingredient_id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewIngredientLine {
    pub ingredient_id: i32,
    pub amount: i32,
}

/// Validated payload for creating or fully replacing a recipe.
#[derive(Debug, Clone)]
pub struct RecipeWrite {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tag_ids: Vec<i32>,
    pub ingredients: Vec<NewIngredientLine>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    /// Matches recipes carrying any of these tag slugs.
    pub tag_slugs: Vec<String>,
    pub author: Option<UserId>,
    /// Restrict to recipes in the given user's lists (all must match).
    pub in_lists: Vec<(UserId, ListKind)>,
    pub limit: u64,
    pub offset: u64,
}

pub struct RecipeRepository {
    conn: DatabaseConnection,
}

impl RecipeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Inserts the recipe with its tags and ingredient lines in one
    /// transaction and stores its short-link token.
    pub async fn create(&self, author: UserId, write: RecipeWrite) -> Result<RecipeRow> {
        let txn = self.conn.begin().await?;

        let model = recipes::ActiveModel {
            author_id: Set(author.value()),
            name: Set(write.name),
            text: Set(write.text),
            cooking_time: Set(write.cooking_time),
            short_link: Set(None),
            pub_date: Set(crate::db::now_timestamp()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert recipe")?;

        let id = RecipeId::new(model.id);
        let token = short_link::encode(id);
        let mut active: recipes::ActiveModel = model.into();
        active.short_link = Set(Some(token));
        let model = active.update(&txn).await?;

        Self::replace_relations(&txn, model.id, &write.tag_ids, &write.ingredients).await?;

        txn.commit().await?;

        info!(recipe_id = model.id, author_id = author.value(), "Recipe created");
        Ok(RecipeRow::from(model))
    }

    /// Replaces scalar fields, tags and ingredient lines.
    pub async fn update(&self, id: RecipeId, write: RecipeWrite) -> Result<Option<RecipeRow>> {
        let txn = self.conn.begin().await?;

        let Some(model) = Recipes::find_by_id(id.value()).one(&txn).await? else {
            return Ok(None);
        };

        let mut active: recipes::ActiveModel = model.into();
        active.name = Set(write.name);
        active.text = Set(write.text);
        active.cooking_time = Set(write.cooking_time);
        let model = active.update(&txn).await.context("Failed to update recipe")?;

        RecipeTags::delete_many()
            .filter(recipe_tags::Column::RecipeId.eq(model.id))
            .exec(&txn)
            .await?;
        RecipeIngredients::delete_many()
            .filter(recipe_ingredients::Column::RecipeId.eq(model.id))
            .exec(&txn)
            .await?;

        Self::replace_relations(&txn, model.id, &write.tag_ids, &write.ingredients).await?;

        txn.commit().await?;

        debug!(recipe_id = model.id, "Recipe updated");
        Ok(Some(RecipeRow::from(model)))
    }

    async fn replace_relations<C: ConnectionTrait>(
        conn: &C,
        recipe_id: i32,
        tag_ids: &[i32],
        lines: &[NewIngredientLine],
    ) -> Result<()> {
        if !tag_ids.is_empty() {
            let rows = tag_ids.iter().map(|&tag_id| recipe_tags::ActiveModel {
                recipe_id: Set(recipe_id),
                tag_id: Set(tag_id),
            });
            RecipeTags::insert_many(rows)
                .exec(conn)
                .await
                .context("Failed to insert recipe tags")?;
        }

        if !lines.is_empty() {
            let rows = lines.iter().map(|line| recipe_ingredients::ActiveModel {
                recipe_id: Set(recipe_id),
                ingredient_id: Set(line.ingredient_id),
                amount: Set(line.amount),
                ..Default::default()
            });
            RecipeIngredients::insert_many(rows)
                .exec(conn)
                .await
                .context("Failed to insert recipe ingredients")?;
        }

        Ok(())
    }

    /// Deletes the recipe; memberships, tags and lines cascade.
    pub async fn delete(&self, id: RecipeId) -> Result<bool> {
        let result = Recipes::delete_by_id(id.value())
            .exec(&self.conn)
            .await
            .context("Failed to delete recipe")?;

        Ok(result.rows_affected > 0)
    }

    /// Writes `token` only if the row has no short link yet, then returns
    /// whatever token the row holds afterwards.
    pub async fn set_short_link_if_absent(
        &self,
        id: RecipeId,
        token: &str,
    ) -> Result<Option<String>> {
        Recipes::update_many()
            .col_expr(
                recipes::Column::ShortLink,
                sea_orm::sea_query::Expr::value(token),
            )
            .filter(recipes::Column::Id.eq(id.value()))
            .filter(recipes::Column::ShortLink.is_null())
            .exec(&self.conn)
            .await
            .context("Failed to store short link")?;

        Ok(self.get(id).await?.and_then(|r| r.short_link))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get(&self, id: RecipeId) -> Result<Option<RecipeRow>> {
        let row = Recipes::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query recipe")?;

        Ok(row.map(RecipeRow::from))
    }

    pub async fn exists(&self, id: RecipeId) -> Result<bool> {
        let count = Recipes::find_by_id(id.value())
            .count(&self.conn)
            .await
            .context("Failed to check recipe")?;

        Ok(count > 0)
    }

    /// Newest first, ties broken by id.
    pub async fn list(&self, filter: &RecipeFilter) -> Result<Vec<RecipeRow>> {
        let mut query = Recipes::find();

        if !filter.tag_slugs.is_empty() {
            let tagged = RecipeTags::find()
                .select_only()
                .column(recipe_tags::Column::RecipeId)
                .inner_join(Tags)
                .filter(tags::Column::Slug.is_in(filter.tag_slugs.iter().cloned()))
                .into_query();
            query = query.filter(recipes::Column::Id.in_subquery(tagged));
        }

        if let Some(author) = filter.author {
            query = query.filter(recipes::Column::AuthorId.eq(author.value()));
        }

        for (user, kind) in &filter.in_lists {
            let members = RecipeLists::find()
                .select_only()
                .column(recipe_lists::Column::RecipeId)
                .filter(recipe_lists::Column::UserId.eq(user.value()))
                .filter(recipe_lists::Column::ListKind.eq(kind.as_str()))
                .into_query();
            query = query.filter(recipes::Column::Id.in_subquery(members));
        }

        let rows = query
            .order_by_desc(recipes::Column::PubDate)
            .order_by_desc(recipes::Column::Id)
            .offset(filter.offset)
            .limit(filter.limit)
            .all(&self.conn)
            .await
            .context("Failed to list recipes")?;

        Ok(rows.into_iter().map(RecipeRow::from).collect())
    }

    /// Up to `limit` newest recipes of one author (all when `None`).
    pub async fn list_by_author(
        &self,
        author: UserId,
        limit: Option<u64>,
    ) -> Result<Vec<RecipeRow>> {
        let rows = Recipes::find()
            .filter(recipes::Column::AuthorId.eq(author.value()))
            .order_by_desc(recipes::Column::PubDate)
            .order_by_desc(recipes::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list author recipes")?;

        Ok(rows.into_iter().map(RecipeRow::from).collect())
    }

    pub async fn count_by_author(&self, author: UserId) -> Result<u64> {
        Recipes::find()
            .filter(recipes::Column::AuthorId.eq(author.value()))
            .count(&self.conn)
            .await
            .context("Failed to count author recipes")
    }

    /// Ingredient lines for each recipe, in insertion order.
    pub async fn lines_for(
        &self,
        recipe_ids: &[RecipeId],
    ) -> Result<HashMap<RecipeId, Vec<RecipeIngredientRow>>> {
        let mut grouped: HashMap<RecipeId, Vec<RecipeIngredientRow>> = HashMap::new();
        if recipe_ids.is_empty() {
            return Ok(grouped);
        }

        let rows = RecipeIngredients::find()
            .filter(
                recipe_ingredients::Column::RecipeId.is_in(recipe_ids.iter().map(RecipeId::value)),
            )
            .find_also_related(Ingredients)
            .order_by_asc(recipe_ingredients::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to load recipe ingredients")?;

        for (line, ingredient) in rows {
            let Some(ingredient) = ingredient else {
                continue;
            };
            grouped
                .entry(RecipeId::new(line.recipe_id))
                .or_default()
                .push(Self::map_line(line, ingredient));
        }

        Ok(grouped)
    }

    fn map_line(
        line: recipe_ingredients::Model,
        ingredient: ingredients::Model,
    ) -> RecipeIngredientRow {
        RecipeIngredientRow {
            ingredient_id: ingredient.id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
            amount: line.amount,
        }
    }

    /// The user's shopping cart expanded to ingredient lines, one entry per
    /// cart recipe in the order they were added.
    pub async fn cart_contents(&self, user: UserId) -> Result<Vec<CartRecipe>> {
        let ids: Vec<i32> = RecipeLists::find()
            .filter(recipe_lists::Column::UserId.eq(user.value()))
            .filter(recipe_lists::Column::ListKind.eq(ListKind::ShoppingCart.as_str()))
            .order_by_asc(recipe_lists::Column::CreatedAt)
            .select_only()
            .column(recipe_lists::Column::RecipeId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to load shopping cart")?;

        let ids: Vec<RecipeId> = ids.into_iter().map(RecipeId::new).collect();
        let mut lines = self.lines_for(&ids).await?;

        ids.into_iter()
            .map(|recipe_id| {
                let lines = lines
                    .remove(&recipe_id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|row| {
                        let amount = u32::try_from(row.amount)
                            .with_context(|| format!("Negative amount on recipe {recipe_id}"))?;
                        Ok(IngredientLine::new(row.name, row.measurement_unit, amount))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CartRecipe { lines })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::db::Store;
    use crate::db::repositories::user::NewUser;

    struct Fixture {
        store: Store,
        author: UserId,
        breakfast: i32,
        dinner: i32,
        flour: i32,
        egg: i32,
    }

    async fn fixture() -> Fixture {
        let store = Store::new("sqlite::memory:").await.unwrap();
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
        let (breakfast, _) = store
            .tags()
            .get_or_create("Breakfast", "breakfast")
            .await
            .unwrap();
        let (dinner, _) = store.tags().get_or_create("Dinner", "dinner").await.unwrap();
        let (flour, _) = store.ingredients().get_or_create("flour", "g").await.unwrap();
        let (egg, _) = store.ingredients().get_or_create("egg", "pc").await.unwrap();

        Fixture {
            store,
            author: UserId::new(author.id),
            breakfast: breakfast.id,
            dinner: dinner.id,
            flour: flour.id,
            egg: egg.id,
        }
    }

    fn write(name: &str, tags: Vec<i32>, lines: Vec<(i32, i32)>) -> RecipeWrite {
        RecipeWrite {
            name: name.to_string(),
            text: "Mix and bake".to_string(),
            cooking_time: 20,
            tag_ids: tags,
            ingredients: lines
                .into_iter()
                .map(|(ingredient_id, amount)| NewIngredientLine {
                    ingredient_id,
                    amount,
                })
                .collect(),
        }
    }

    fn all() -> RecipeFilter {
        RecipeFilter {
            limit: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_stores_short_link_and_relations() {
        let f = fixture().await;
        let repo = f.store.recipes();

        let recipe = repo
            .create(
                f.author,
                write("Pancakes", vec![f.breakfast], vec![(f.flour, 200), (f.egg, 2)]),
            )
            .await
            .unwrap();

        assert_eq!(
            recipe.short_link.as_deref(),
            Some(short_link::encode(recipe.id).as_str())
        );

        let lines = repo.lines_for(&[recipe.id]).await.unwrap();
        let names: Vec<&str> = lines[&recipe.id].iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["flour", "egg"]);

        let tags = f.store.tags().for_recipes(&[recipe.id.value()]).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].1.slug, "breakfast");
    }

    #[tokio::test]
    async fn update_replaces_tags_and_lines() {
        let f = fixture().await;
        let repo = f.store.recipes();
        let recipe = repo
            .create(f.author, write("Bread", vec![f.breakfast], vec![(f.flour, 500)]))
            .await
            .unwrap();

        let updated = repo
            .update(recipe.id, write("Omelette", vec![f.dinner], vec![(f.egg, 3)]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Omelette");
        assert_eq!(updated.short_link, recipe.short_link);

        let lines = repo.lines_for(&[recipe.id]).await.unwrap();
        assert_eq!(lines[&recipe.id].len(), 1);
        assert_eq!(lines[&recipe.id][0].amount, 3);

        let tags = f.store.tags().for_recipes(&[recipe.id.value()]).await.unwrap();
        assert_eq!(tags[0].1.slug, "dinner");
    }

    #[tokio::test]
    async fn list_filters_by_tag_slug_newest_first() {
        let f = fixture().await;
        let repo = f.store.recipes();
        let first = repo
            .create(f.author, write("A", vec![f.breakfast], vec![(f.egg, 1)]))
            .await
            .unwrap();
        let second = repo
            .create(f.author, write("B", vec![f.dinner], vec![(f.egg, 1)]))
            .await
            .unwrap();
        let third = repo
            .create(
                f.author,
                write("C", vec![f.breakfast, f.dinner], vec![(f.egg, 1)]),
            )
            .await
            .unwrap();

        let ids: Vec<RecipeId> = repo.list(&all()).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let filter = RecipeFilter {
            tag_slugs: vec!["breakfast".to_string()],
            ..all()
        };
        let ids: Vec<RecipeId> = repo.list(&filter).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);

        let window = RecipeFilter {
            limit: 1,
            offset: 1,
            ..all()
        };
        let ids: Vec<RecipeId> = repo.list(&window).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id]);
    }

    #[tokio::test]
    async fn list_filters_by_membership() {
        let f = fixture().await;
        let repo = f.store.recipes();
        let liked = repo
            .create(f.author, write("Liked", vec![f.dinner], vec![(f.egg, 1)]))
            .await
            .unwrap();
        repo.create(f.author, write("Other", vec![f.dinner], vec![(f.egg, 1)]))
            .await
            .unwrap();
        f.store
            .memberships()
            .add(f.author, liked.id, ListKind::Favorite)
            .await
            .unwrap();

        let filter = RecipeFilter {
            in_lists: vec![(f.author, ListKind::Favorite)],
            ..all()
        };
        let rows = repo.list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, liked.id);
    }

    #[tokio::test]
    async fn cart_contents_expands_lines() {
        let f = fixture().await;
        let repo = f.store.recipes();
        let pancakes = repo
            .create(
                f.author,
                write("Pancakes", vec![f.breakfast], vec![(f.flour, 200), (f.egg, 2)]),
            )
            .await
            .unwrap();
        let bread = repo
            .create(f.author, write("Bread", vec![f.breakfast], vec![(f.flour, 100)]))
            .await
            .unwrap();
        for id in [pancakes.id, bread.id] {
            f.store
                .memberships()
                .add(f.author, id, ListKind::ShoppingCart)
                .await
                .unwrap();
        }

        let cart = repo.cart_contents(f.author).await.unwrap();
        assert_eq!(cart.len(), 2);
        let items = crate::shopping_list::aggregate(&cart).unwrap();
        let text = crate::shopping_list::render(&items);
        assert_eq!(text, "egg (pc) — 2\nflour (g) — 300");
    }

    #[tokio::test]
    async fn set_short_link_never_overwrites() {
        let f = fixture().await;
        let repo = f.store.recipes();
        let recipe = repo
            .create(f.author, write("Soup", vec![f.dinner], vec![(f.egg, 1)]))
            .await
            .unwrap();

        let stored = repo
            .set_short_link_if_absent(recipe.id, "something-else")
            .await
            .unwrap();
        assert_eq!(stored, recipe.short_link);
    }

    #[tokio::test]
    async fn delete_cascades_memberships() {
        let f = fixture().await;
        let repo = f.store.recipes();
        let recipe = repo
            .create(f.author, write("Gone", vec![f.dinner], vec![(f.egg, 1)]))
            .await
            .unwrap();
        f.store
            .memberships()
            .add(f.author, recipe.id, ListKind::ShoppingCart)
            .await
            .unwrap();

        assert!(repo.delete(recipe.id).await.unwrap());
        assert!(!repo.delete(recipe.id).await.unwrap());
        assert!(repo.cart_contents(f.author).await.unwrap().is_empty());
    }
}
