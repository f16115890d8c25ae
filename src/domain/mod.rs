//! Recipe costing and pricing logic lives here.

pub mod costing;
pub mod entities;
pub mod pricing;
pub mod units;

pub use costing::{
    cost_breakdown, cost_per_serving, line_cost, total_cost, CostBreakdown, CostingError, LineCost,
};
pub use entities::{Ingredient, IngredientId, PriceData, Recipe, RecipeId, RecipeIngredientLine};
pub use pricing::{calculate_recipe_price, charm_price, price, GROSS_PROFIT_TARGET, TAX_RATE};
pub use units::{convert_cost_per_unit, Dimension, Unit};
