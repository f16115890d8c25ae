//! Menu pricing from a per-serving cost.
//!
//! The recommended price targets a fixed gross margin, adds tax, then applies
//! charm pricing to the tax-inclusive figure. Every reported figure is derived
//! from that final charm-priced amount.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::costing::{checked, cost_per_serving, total_cost, CostingError};
use super::entities::{PriceData, Recipe, RecipeIngredientLine};

/// Share of the tax-exclusive price kept as gross profit.
pub const GROSS_PROFIT_TARGET: Decimal = dec!(0.70);
pub const TAX_RATE: Decimal = dec!(0.10);

const HUNDRED: Decimal = dec!(100);
const MINOR_UNIT: Decimal = dec!(0.01);
const REPORT_DP: u32 = 2;

/// Rounds up to the next whole currency unit and drops one minor unit
/// (12.37 becomes 12.99, 11.00 becomes 10.99). Never goes below 0.99.
pub fn charm_price(price: Decimal) -> Decimal {
    price.ceil().max(Decimal::ONE) - MINOR_UNIT
}

pub fn price(cost_per_serving: Decimal) -> Result<PriceData, CostingError> {
    if cost_per_serving < Decimal::ZERO {
        return Err(CostingError::NegativeServingCost(cost_per_serving));
    }

    let tax_multiplier = Decimal::ONE + TAX_RATE;
    let price_excl_tax = checked(
        cost_per_serving.checked_div(Decimal::ONE - GROSS_PROFIT_TARGET),
        "price before tax",
    )?;
    let price_incl_tax = checked(price_excl_tax.checked_mul(tax_multiplier), "price with tax")?;

    let final_incl_tax = charm_price(price_incl_tax);
    let final_excl_tax = final_incl_tax / tax_multiplier;

    let gross_profit = final_excl_tax - cost_per_serving;
    let gross_profit_margin = gross_profit / final_excl_tax * HUNDRED;
    let contributing_margin = final_excl_tax - cost_per_serving;
    let contributing_margin_percent = contributing_margin / final_excl_tax * HUNDRED;
    let food_cost_percent = cost_per_serving / final_incl_tax * HUNDRED;

    Ok(PriceData {
        cost_per_serving: report(cost_per_serving),
        recommended_price: report(final_incl_tax),
        recommended_price_excl_tax: report(final_excl_tax),
        food_cost_percent: report(food_cost_percent),
        gross_profit: report(gross_profit),
        gross_profit_margin: report(gross_profit_margin),
        contributing_margin: report(contributing_margin),
        contributing_margin_percent: report(contributing_margin_percent),
    })
}

/// Prices one recipe from its ingredient lines. Returns `None` when there are
/// no lines to price from.
pub fn calculate_recipe_price(
    recipe: &Recipe,
    lines: &[RecipeIngredientLine],
) -> Result<Option<PriceData>, CostingError> {
    if lines.is_empty() {
        return Ok(None);
    }

    let total = total_cost(lines)?;
    let per_serving = cost_per_serving(total, recipe.yield_amount)?;
    tracing::debug!(
        recipe_id = %recipe.id,
        lines = lines.len(),
        %total,
        %per_serving,
        "costed recipe"
    );
    price(per_serving).map(Some)
}

fn report(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(REPORT_DP, RoundingStrategy::MidpointAwayFromZero)
}
