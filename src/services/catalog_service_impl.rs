//! `SeaORM` implementation of the `CatalogService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::api::types::{IngredientDto, TagDto};
use crate::db::Store;
use crate::services::catalog_service::{
    CatalogError, CatalogService, ImportSummary, IngredientSeed, TagSeed,
};

pub struct SeaOrmCatalogService {
    store: Store,
}

impl SeaOrmCatalogService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CatalogService for SeaOrmCatalogService {
    async fn list_tags(&self) -> Result<Vec<TagDto>, CatalogError> {
        let tags = self.store.tags().list().await?;
        Ok(tags.into_iter().map(TagDto::from).collect())
    }

    async fn get_tag(&self, id: i32) -> Result<TagDto, CatalogError> {
        self.store
            .tags()
            .get(id)
            .await?
            .map(TagDto::from)
            .ok_or(CatalogError::TagNotFound(id))
    }

    async fn search_ingredients(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<IngredientDto>, CatalogError> {
        let rows = self.store.ingredients().search(prefix).await?;
        Ok(rows.into_iter().map(IngredientDto::from).collect())
    }

    async fn get_ingredient(&self, id: i32) -> Result<IngredientDto, CatalogError> {
        self.store
            .ingredients()
            .get(id)
            .await?
            .map(IngredientDto::from)
            .ok_or(CatalogError::IngredientNotFound(id))
    }

    async fn import_ingredients(
        &self,
        seeds: Vec<IngredientSeed>,
    ) -> Result<ImportSummary, CatalogError> {
        for seed in &seeds {
            seed.validate()?;
        }

        let repo = self.store.ingredients();
        let mut summary = ImportSummary::default();
        for seed in seeds {
            let (_, created) = repo
                .get_or_create(seed.name.trim(), seed.measurement_unit.trim())
                .await?;
            if created {
                summary.created += 1;
            } else {
                summary.existing += 1;
            }
        }

        info!(
            created = summary.created,
            existing = summary.existing,
            "Ingredient import finished"
        );
        Ok(summary)
    }

    async fn import_tags(&self, seeds: Vec<TagSeed>) -> Result<ImportSummary, CatalogError> {
        for seed in &seeds {
            seed.validate()?;
        }

        let repo = self.store.tags();
        let mut summary = ImportSummary::default();
        for seed in seeds {
            let (_, created) = repo.get_or_create(seed.name.trim(), seed.slug.trim()).await?;
            if created {
                summary.created += 1;
            } else {
                summary.existing += 1;
            }
        }

        info!(
            created = summary.created,
            existing = summary.existing,
            "Tag import finished"
        );
        Ok(summary)
    }
}
