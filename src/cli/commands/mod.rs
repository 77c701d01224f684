mod load;

pub use load::{cmd_load_ingredients, cmd_load_tags};
