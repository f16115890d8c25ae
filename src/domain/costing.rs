use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use super::entities::{IngredientId, RecipeIngredientLine};
use super::units::{convert_cost_per_unit, Unit};

const HUNDRED: Decimal = dec!(100);

/// Rejected costing input. Costing feeds a sell price, so bad numbers fail
/// the calculation instead of being coerced.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CostingError {
    #[error("unknown unit: {0:?}")]
    UnknownUnit(String),
    #[error("cannot convert between {from} and {to}")]
    IncompatibleUnits { from: Unit, to: Unit },
    #[error("ingredient {ingredient_id} has a negative cost per unit ({cost})")]
    NegativeCost {
        ingredient_id: IngredientId,
        cost: Decimal,
    },
    #[error("line for ingredient {ingredient_id} has a negative quantity ({quantity})")]
    NegativeQuantity {
        ingredient_id: IngredientId,
        quantity: Decimal,
    },
    #[error("ingredient {ingredient_id} has a negative waste percentage ({waste})")]
    NegativeWaste {
        ingredient_id: IngredientId,
        waste: Decimal,
    },
    #[error("line for ingredient {0} has no ingredient record")]
    MissingIngredient(IngredientId),
    #[error("cost per serving must not be negative ({0})")]
    NegativeServingCost(Decimal),
    #[error("{0} is out of range")]
    Overflow(&'static str),
}

/// Cost of a single recipe line at each adjustment stage.
#[derive(Clone, Debug, PartialEq)]
pub struct LineCost {
    pub line_id: String,
    pub ingredient_id: IngredientId,
    pub base_cost: Decimal,
    pub waste_adjusted_cost: Decimal,
    pub yield_adjusted_cost: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CostBreakdown {
    pub lines: Vec<LineCost>,
    pub total_cost: Decimal,
}

pub fn line_cost(line: &RecipeIngredientLine) -> Result<LineCost, CostingError> {
    let ingredient = line
        .ingredient
        .as_ref()
        .ok_or_else(|| CostingError::MissingIngredient(line.ingredient_id.clone()))?;

    if ingredient.cost_per_unit < Decimal::ZERO {
        return Err(CostingError::NegativeCost {
            ingredient_id: ingredient.id.clone(),
            cost: ingredient.cost_per_unit,
        });
    }
    if line.quantity < Decimal::ZERO {
        return Err(CostingError::NegativeQuantity {
            ingredient_id: line.ingredient_id.clone(),
            quantity: line.quantity,
        });
    }
    let waste = ingredient.trim_peel_waste_percentage;
    if waste < Decimal::ZERO {
        return Err(CostingError::NegativeWaste {
            ingredient_id: ingredient.id.clone(),
            waste,
        });
    }

    let unit_cost = convert_cost_per_unit(ingredient.cost_per_unit, &ingredient.unit, &line.unit)?;
    let base_cost = checked(line.quantity.checked_mul(unit_cost), "base cost")?;
    let waste_adjusted_cost = checked(
        base_cost.checked_mul(Decimal::ONE + waste / HUNDRED),
        "waste-adjusted cost",
    )?;

    let yield_percentage = if ingredient.yield_percentage <= Decimal::ZERO {
        tracing::warn!(
            ingredient_id = %ingredient.id,
            yield_percentage = %ingredient.yield_percentage,
            "non-positive yield percentage, costing at 100%"
        );
        HUNDRED
    } else {
        ingredient.yield_percentage
    };
    let yield_adjusted_cost = checked(
        waste_adjusted_cost.checked_div(yield_percentage / HUNDRED),
        "yield-adjusted cost",
    )?;

    Ok(LineCost {
        line_id: line.id.clone(),
        ingredient_id: line.ingredient_id.clone(),
        base_cost,
        waste_adjusted_cost,
        yield_adjusted_cost,
    })
}

pub fn cost_breakdown(lines: &[RecipeIngredientLine]) -> Result<CostBreakdown, CostingError> {
    let lines = lines.iter().map(line_cost).collect::<Result<Vec<_>, _>>()?;
    let total_cost = lines.iter().try_fold(Decimal::ZERO, |total, line| {
        checked(total.checked_add(line.yield_adjusted_cost), "recipe total")
    })?;
    Ok(CostBreakdown { lines, total_cost })
}

/// Sum of every line's yield-adjusted cost.
pub fn total_cost(lines: &[RecipeIngredientLine]) -> Result<Decimal, CostingError> {
    cost_breakdown(lines).map(|breakdown| breakdown.total_cost)
}

/// Splits a recipe total across its servings. A non-positive serving count
/// is costed as a single serving.
pub fn cost_per_serving(total_cost: Decimal, servings: Decimal) -> Result<Decimal, CostingError> {
    if servings <= Decimal::ZERO {
        tracing::warn!(%servings, "non-positive recipe yield, costing as one serving");
        return Ok(total_cost);
    }
    checked(total_cost.checked_div(servings), "cost per serving")
}

pub(crate) fn checked(value: Option<Decimal>, what: &'static str) -> Result<Decimal, CostingError> {
    value.ok_or(CostingError::Overflow(what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Ingredient;

    fn ingredient(cost: Decimal, unit: &str, waste: Decimal, yield_pct: Decimal) -> Ingredient {
        Ingredient {
            id: "ing-1".to_string(),
            ingredient_name: "Beef mince".to_string(),
            cost_per_unit: cost,
            unit: unit.to_string(),
            trim_peel_waste_percentage: waste,
            yield_percentage: yield_pct,
        }
    }

    fn line(quantity: Decimal, unit: &str, ingredient: Option<Ingredient>) -> RecipeIngredientLine {
        RecipeIngredientLine {
            id: "line-1".to_string(),
            recipe_id: "r1".to_string(),
            ingredient_id: "ing-1".to_string(),
            quantity,
            unit: unit.to_string(),
            ingredient,
        }
    }

    #[test]
    fn applies_conversion_waste_and_yield() {
        let line = line(
            dec!(200),
            "g",
            Some(ingredient(dec!(10), "kg", dec!(10), dec!(80))),
        );
        let cost = line_cost(&line).unwrap();
        assert_eq!(cost.base_cost, dec!(2.00));
        assert_eq!(cost.waste_adjusted_cost, dec!(2.20));
        assert_eq!(cost.yield_adjusted_cost, dec!(2.75));
    }

    #[test]
    fn zero_yield_is_costed_as_full_yield() {
        let line = line(dec!(1), "kg", Some(ingredient(dec!(4), "kg", dec!(0), dec!(0))));
        assert_eq!(line_cost(&line).unwrap().yield_adjusted_cost, dec!(4));
    }

    #[test]
    fn totals_all_lines() {
        let lines = vec![
            line(dec!(200), "g", Some(ingredient(dec!(10), "kg", dec!(10), dec!(80)))),
            line(dec!(3), "each", Some(ingredient(dec!(0.5), "each", dec!(0), dec!(100)))),
        ];
        assert_eq!(total_cost(&lines).unwrap(), dec!(4.25));
    }

    #[test]
    fn empty_recipe_costs_nothing() {
        assert_eq!(total_cost(&[]).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn rejects_negative_inputs() {
        let negative_cost = line(dec!(1), "g", Some(ingredient(dec!(-1), "g", dec!(0), dec!(100))));
        assert!(matches!(
            line_cost(&negative_cost),
            Err(CostingError::NegativeCost { .. })
        ));

        let negative_quantity =
            line(dec!(-2), "g", Some(ingredient(dec!(1), "g", dec!(0), dec!(100))));
        assert!(matches!(
            line_cost(&negative_quantity),
            Err(CostingError::NegativeQuantity { .. })
        ));

        let negative_waste = line(dec!(1), "g", Some(ingredient(dec!(1), "g", dec!(-5), dec!(100))));
        assert!(matches!(
            line_cost(&negative_waste),
            Err(CostingError::NegativeWaste { .. })
        ));
    }

    #[test]
    fn rejects_line_without_ingredient() {
        assert_eq!(
            line_cost(&line(dec!(1), "g", None)),
            Err(CostingError::MissingIngredient("ing-1".to_string()))
        );
    }

    #[test]
    fn rejects_incompatible_units() {
        let line = line(dec!(1), "ml", Some(ingredient(dec!(1), "kg", dec!(0), dec!(100))));
        assert!(matches!(
            line_cost(&line),
            Err(CostingError::IncompatibleUnits { .. })
        ));
    }

    #[test]
    fn serving_cost_guards_zero_yield() {
        assert_eq!(cost_per_serving(dec!(12), dec!(4)), Ok(dec!(3)));
        assert_eq!(cost_per_serving(dec!(12), dec!(0)), Ok(dec!(12)));
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        let oversized = line(dec!(2), "g", Some(ingredient(Decimal::MAX, "g", dec!(0), dec!(100))));
        assert_eq!(line_cost(&oversized), Err(CostingError::Overflow("base cost")));

        let huge = ingredient(Decimal::MAX / dec!(2), "g", dec!(0), dec!(100));
        let lines = vec![
            line(dec!(1.5), "g", Some(huge.clone())),
            line(dec!(1.5), "g", Some(huge)),
        ];
        assert_eq!(total_cost(&lines), Err(CostingError::Overflow("recipe total")));

        assert_eq!(
            cost_per_serving(Decimal::MAX, dec!(0.5)),
            Err(CostingError::Overflow("cost per serving"))
        );
    }
}
