use crate::entities::{ingredients, prelude::*};
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<ingredients::Model> for Ingredient {
    fn from(m: ingredients::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            measurement_unit: m.measurement_unit,
        }
    }
}

pub struct IngredientRepository {
    conn: DatabaseConnection,
}

impl IngredientRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Lists ingredients ordered by name, optionally restricted to names
    /// starting with `prefix`.
    pub async fn search(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let mut query = Ingredients::find();

        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            query = query.filter(ingredients::Column::Name.starts_with(prefix));
        }

        let rows = query
            .order_by_asc(ingredients::Column::Name)
            .order_by_asc(ingredients::Column::MeasurementUnit)
            .all(&self.conn)
            .await
            .context("Failed to list ingredients")?;

        Ok(rows.into_iter().map(Ingredient::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Ingredient>> {
        let row = Ingredients::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query ingredient")?;

        Ok(row.map(Ingredient::from))
    }

    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<Ingredient>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = Ingredients::find()
            .filter(ingredients::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await
            .context("Failed to query ingredients by ID")?;

        Ok(rows.into_iter().map(Ingredient::from).collect())
    }

    /// Returns `(ingredient, created)` for the `(name, unit)` pair.
    pub async fn get_or_create(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<(Ingredient, bool)> {
        if let Some(existing) = Ingredients::find()
            .filter(ingredients::Column::Name.eq(name))
            .filter(ingredients::Column::MeasurementUnit.eq(measurement_unit))
            .one(&self.conn)
            .await?
        {
            return Ok((Ingredient::from(existing), false));
        }

        let model = ingredients::ActiveModel {
            name: Set(name.to_string()),
            measurement_unit: Set(measurement_unit.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .with_context(|| format!("Failed to insert ingredient {name} ({measurement_unit})"))?;

        Ok((Ingredient::from(model), true))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Store;

    #[tokio::test]
    async fn search_filters_by_name_prefix() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let repo = store.ingredients();
        repo.get_or_create("sugar", "g").await.unwrap();
        repo.get_or_create("salt", "g").await.unwrap();
        repo.get_or_create("butter", "g").await.unwrap();

        let all = repo.search(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "butter");

        let s: Vec<String> = repo
            .search(Some("s"))
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(s, vec!["salt", "sugar"]);
    }

    #[tokio::test]
    async fn same_name_with_other_unit_is_a_new_ingredient() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let repo = store.ingredients();

        let (grams, _) = repo.get_or_create("milk", "g").await.unwrap();
        let (ml, created) = repo.get_or_create("milk", "ml").await.unwrap();
        assert!(created);
        assert_ne!(grams.id, ml.id);

        let (again, created) = repo.get_or_create("milk", "ml").await.unwrap();
        assert!(!created);
        assert_eq!(again.id, ml.id);
    }
}
