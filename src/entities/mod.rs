pub mod prelude;

pub mod ingredients;
pub mod recipe_ingredients;
pub mod recipe_lists;
pub mod recipe_tags;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;
