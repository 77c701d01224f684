use crate::entities::{prelude::*, recipe_tags, tags};
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<tags::Model> for Tag {
    fn from(m: tags::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
        }
    }
}

/// Repository for the read-mostly tag catalogue
pub struct TagRepository {
    conn: DatabaseConnection,
}

impl TagRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Tag>> {
        let rows = Tags::find()
            .order_by_asc(tags::Column::Name)
            .order_by_asc(tags::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list tags")?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Tag>> {
        let row = Tags::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query tag")?;

        Ok(row.map(Tag::from))
    }

    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = Tags::find()
            .filter(tags::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(tags::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to query tags by ID")?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }

    /// Tags attached to each of the given recipes, keyed by recipe id.
    pub async fn for_recipes(&self, recipe_ids: &[i32]) -> Result<Vec<(i32, Tag)>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = RecipeTags::find()
            .filter(recipe_tags::Column::RecipeId.is_in(recipe_ids.iter().copied()))
            .find_also_related(Tags)
            .order_by_asc(tags::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to load recipe tags")?;

        Ok(rows
            .into_iter()
            .filter_map(|(link, tag)| tag.map(|t| (link.recipe_id, Tag::from(t))))
            .collect())
    }

    /// Returns the tag with `slug`, creating it when absent.
    /// Returns `(tag, created)`.
    pub async fn get_or_create(&self, name: &str, slug: &str) -> Result<(Tag, bool)> {
        if let Some(existing) = Tags::find()
            .filter(tags::Column::Slug.eq(slug))
            .one(&self.conn)
            .await?
        {
            return Ok((Tag::from(existing), false));
        }

        let model = tags::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .with_context(|| format!("Failed to insert tag {slug}"))?;

        info!("Created tag {} ({})", model.name, model.slug);
        Ok((Tag::from(model), true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[tokio::test]
    async fn get_or_create_is_idempotent_by_slug() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let repo = store.tags();

        let (first, created) = repo.get_or_create("Breakfast", "breakfast").await.unwrap();
        assert!(created);

        let (second, created) = repo.get_or_create("Morning", "breakfast").await.unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(second.name, "Breakfast");
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let repo = store.tags();
        repo.get_or_create("Lunch", "lunch").await.unwrap();
        repo.get_or_create("Dinner", "dinner").await.unwrap();
        repo.get_or_create("Breakfast", "breakfast").await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Breakfast", "Dinner", "Lunch"]);
    }
}
