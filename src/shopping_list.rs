//! Shopping-list aggregation over the recipes in a user's cart.
//!
//! Lines are grouped by `(name, measurement unit)`, amounts are summed in a
//! `u64`, and groups are ordered by name using byte-wise (case-sensitive)
//! comparison, then by unit, then by first appearance.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// One ingredient line of a recipe, already joined with the ingredient row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

impl IngredientLine {
    pub fn new(name: impl Into<String>, measurement_unit: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            measurement_unit: measurement_unit.into(),
            amount,
        }
    }
}

/// A recipe from the cart expanded to its ingredient lines.
#[derive(Debug, Clone)]
pub struct CartRecipe {
    pub lines: Vec<IngredientLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: u64,
}

impl fmt::Display for ShoppingListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) — {}", self.name, self.measurement_unit, self.total)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShoppingListError {
    #[error("Shopping cart is empty")]
    EmptyCollection,
}

pub fn aggregate(cart: &[CartRecipe]) -> Result<Vec<ShoppingListItem>, ShoppingListError> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut items: Vec<ShoppingListItem> = Vec::new();

    for line in cart.iter().flat_map(|recipe| &recipe.lines) {
        let key = (line.name.as_str(), line.measurement_unit.as_str());
        match index.get(&key) {
            Some(&pos) => {
                let item = &mut items[pos];
                item.total = item.total.saturating_add(u64::from(line.amount));
            }
            None => {
                index.insert(key, items.len());
                items.push(ShoppingListItem {
                    name: line.name.clone(),
                    measurement_unit: line.measurement_unit.clone(),
                    total: u64::from(line.amount),
                });
            }
        }
    }

    if items.is_empty() {
        return Err(ShoppingListError::EmptyCollection);
    }

    // `sort_by` is stable, so equal keys keep first-seen order.
    items.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
    });

    Ok(items)
}

/// Renders items as the downloadable text file body.
#[must_use]
pub fn render(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(lines: Vec<IngredientLine>) -> CartRecipe {
        CartRecipe { lines }
    }

    #[test]
    fn sums_amounts_across_recipes_and_sorts_by_name() {
        let cart = vec![
            recipe(vec![
                IngredientLine::new("flour", "g", 200),
                IngredientLine::new("egg", "pc", 2),
            ]),
            recipe(vec![IngredientLine::new("flour", "g", 100)]),
        ];

        let items = aggregate(&cart).unwrap();
        let lines: Vec<String> = items.iter().map(ToString::to_string).collect();

        assert_eq!(lines, vec!["egg (pc) — 2", "flour (g) — 300"]);
    }

    #[test]
    fn empty_cart_is_an_error() {
        assert_eq!(aggregate(&[]), Err(ShoppingListError::EmptyCollection));
    }

    #[test]
    fn cart_without_lines_is_an_error() {
        let cart = vec![recipe(vec![]), recipe(vec![])];
        assert_eq!(aggregate(&cart), Err(ShoppingListError::EmptyCollection));
    }

    #[test]
    fn same_name_with_different_units_stays_separate() {
        let cart = vec![
            recipe(vec![IngredientLine::new("milk", "ml", 250)]),
            recipe(vec![IngredientLine::new("milk", "cup", 1)]),
            recipe(vec![IngredientLine::new("milk", "ml", 50)]),
        ];

        let items = aggregate(&cart).unwrap();

        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: "milk".to_string(),
                    measurement_unit: "cup".to_string(),
                    total: 1,
                },
                ShoppingListItem {
                    name: "milk".to_string(),
                    measurement_unit: "ml".to_string(),
                    total: 300,
                },
            ]
        );
    }

    #[test]
    fn ordering_is_case_sensitive() {
        let cart = vec![recipe(vec![
            IngredientLine::new("apple", "pc", 1),
            IngredientLine::new("Zucchini", "pc", 1),
            IngredientLine::new("Banana", "pc", 1),
        ])];

        let names: Vec<String> = aggregate(&cart)
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();

        assert_eq!(names, vec!["Banana", "Zucchini", "apple"]);
    }

    #[test]
    fn duplicate_lines_within_one_recipe_are_summed() {
        let cart = vec![recipe(vec![
            IngredientLine::new("salt", "g", 5),
            IngredientLine::new("salt", "g", 5),
        ])];

        assert_eq!(aggregate(&cart).unwrap()[0].total, 10);
    }

    #[test]
    fn totals_do_not_overflow_u32() {
        let lines = (0..4)
            .map(|_| IngredientLine::new("water", "ml", u32::MAX))
            .collect();
        let items = aggregate(&[recipe(lines)]).unwrap();
        assert_eq!(items[0].total, u64::from(u32::MAX) * 4);
    }

    #[test]
    fn render_joins_with_newlines_without_trailer() {
        let cart = vec![recipe(vec![
            IngredientLine::new("sugar", "g", 30),
            IngredientLine::new("butter", "g", 50),
        ])];

        let text = render(&aggregate(&cart).unwrap());
        assert_eq!(text, "butter (g) — 50\nsugar (g) — 30");
    }
}
