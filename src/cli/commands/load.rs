//! Catalogue import command handlers

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::db::Store;
use crate::services::{CatalogService, ImportSummary, SeaOrmCatalogService};

fn read_seeds<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn catalog(config: &Config) -> anyhow::Result<SeaOrmCatalogService> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    Ok(SeaOrmCatalogService::new(store))
}

fn print_summary(what: &str, summary: ImportSummary) {
    println!(
        "✓ {what}: {} created, {} already present",
        summary.created, summary.existing
    );
}

pub async fn cmd_load_ingredients(config: &Config, path: &Path) -> anyhow::Result<()> {
    let seeds = read_seeds(path)?;
    let summary = catalog(config)
        .await?
        .import_ingredients(seeds)
        .await
        .context("Ingredient import failed")?;

    print_summary("Ingredients", summary);
    Ok(())
}

pub async fn cmd_load_tags(config: &Config, path: &Path) -> anyhow::Result<()> {
    let seeds = read_seeds(path)?;
    let summary = catalog(config)
        .await?
        .import_tags(seeds)
        .await
        .context("Tag import failed")?;

    print_summary("Tags", summary);
    Ok(())
}
