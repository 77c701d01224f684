pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod catalog_service;
pub mod catalog_service_impl;
pub use catalog_service::{CatalogError, CatalogService, ImportSummary, IngredientSeed, TagSeed};
pub use catalog_service_impl::SeaOrmCatalogService;

pub mod recipe_service;
pub mod recipe_service_impl;
pub use recipe_service::{
    IngredientAmount, RecipeError, RecipeInput, RecipeQuery, RecipeService, ShoppingListFile,
};
pub use recipe_service_impl::SeaOrmRecipeService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{RegisterInput, UserError, UserService};
pub use user_service_impl::SeaOrmUserService;
