use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Identifier for recipes in the backing store.
pub type RecipeId = String;

/// Identifier for ingredients in the backing store.
pub type IngredientId = String;

/// A purchasable ingredient with its stored cost basis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(deserialize_with = "id_from_json")]
    pub id: IngredientId,
    pub ingredient_name: String,
    /// Money per one `unit`.
    pub cost_per_unit: Decimal,
    pub unit: String,
    /// Share lost to trimming/peeling before use, 0-100.
    #[serde(default)]
    pub trim_peel_waste_percentage: Decimal,
    /// Usable share after cooking/processing, 0-100.
    #[serde(default = "full_yield")]
    pub yield_percentage: Decimal,
}

/// One line of a recipe: an ingredient and how much of it, in the author's unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredientLine {
    #[serde(default, deserialize_with = "id_from_json")]
    pub id: String,
    #[serde(deserialize_with = "id_from_json")]
    pub recipe_id: RecipeId,
    #[serde(deserialize_with = "id_from_json")]
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    pub unit: String,
    /// Joined ingredient record. The primary endpoints embed it; the
    /// fallback store path fills it in client-side.
    #[serde(default, alias = "ingredients")]
    pub ingredient: Option<Ingredient>,
}

impl RecipeIngredientLine {
    pub fn with_ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredient = Some(ingredient);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(deserialize_with = "id_from_json")]
    pub id: RecipeId,
    #[serde(default)]
    pub name: String,
    /// Number of servings the recipe produces. Costed as one serving when
    /// zero or negative.
    #[serde(rename = "yield")]
    pub yield_amount: Decimal,
    #[serde(default)]
    pub yield_unit: Option<String>,
}

/// Derived pricing view for one recipe. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub cost_per_serving: Decimal,
    /// Tax-inclusive, charm-priced sell price.
    #[serde(rename = "recommendedPrice")]
    pub recommended_price: Decimal,
    #[serde(rename = "recommendedPriceExclTax")]
    pub recommended_price_excl_tax: Decimal,
    #[serde(rename = "foodCostPercent")]
    pub food_cost_percent: Decimal,
    pub gross_profit: Decimal,
    pub gross_profit_margin: Decimal,
    #[serde(rename = "contributingMargin")]
    pub contributing_margin: Decimal,
    #[serde(rename = "contributingMarginPercent")]
    pub contributing_margin_percent: Decimal,
}

fn full_yield() -> Decimal {
    dec!(100)
}

/// Store ids as they appear on the wire: text keys or integer primary keys.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

pub(crate) fn id_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match WireId::deserialize(deserializer)? {
        WireId::Text(id) => id,
        WireId::Unsigned(id) => id.to_string(),
        WireId::Signed(id) => id.to_string(),
    })
}
