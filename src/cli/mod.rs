//! CLI module - Command-line interface for Foodgram
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Foodgram - recipe sharing backend
#[derive(Parser)]
#[command(name = "foodgram")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server (default)
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Import ingredients from a JSON file of `{name, measurement_unit}` objects
    LoadIngredients {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Import tags from a JSON file of `{name, slug}` objects
    LoadTags {
        /// Path to the JSON file
        file: PathBuf,
    },
}

pub use commands::*;
