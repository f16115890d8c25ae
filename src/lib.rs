//! Recipe costing core.
//!
//! Fetches recipe ingredient lines without duplicating concurrent requests,
//! then turns them into per-serving costs and recommended menu prices.

pub mod domain;
pub mod infra;
pub mod util;

pub use domain::{
    calculate_recipe_price, CostingError, Ingredient, PriceData, Recipe, RecipeId,
    RecipeIngredientLine,
};
pub use infra::{FetchOutcome, FetchStatus, IngredientFetchFacade};
pub use util::config::{load_config, FetchConfig};
