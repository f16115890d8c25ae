//! Unit conversion for ingredient costs.
//!
//! Every unit maps to an exact decimal factor against the base unit of its
//! dimension (gram, millilitre, each). Converting between dimensions would need
//! an ingredient density, so it is rejected instead of guessed.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::costing::CostingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Mass,
    Volume,
    Count,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    Milligram,
    Gram,
    Kilogram,
    Ounce,
    Pound,
    Millilitre,
    Centilitre,
    Decilitre,
    Litre,
    Teaspoon,
    Tablespoon,
    FluidOunce,
    Cup,
    Pint,
    Quart,
    Gallon,
    Each,
    Dozen,
}

impl Unit {
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Milligram | Self::Gram | Self::Kilogram | Self::Ounce | Self::Pound => {
                Dimension::Mass
            }
            Self::Each | Self::Dozen => Dimension::Count,
            _ => Dimension::Volume,
        }
    }

    /// Size of one of this unit in grams, millilitres or pieces.
    pub fn base_factor(&self) -> Decimal {
        match self {
            Self::Milligram => dec!(0.001),
            Self::Gram => dec!(1),
            Self::Kilogram => dec!(1000),
            Self::Ounce => dec!(28.349523125),
            Self::Pound => dec!(453.59237),
            Self::Millilitre => dec!(1),
            Self::Centilitre => dec!(10),
            Self::Decilitre => dec!(100),
            Self::Litre => dec!(1000),
            Self::Teaspoon => dec!(4.92892159375),
            Self::Tablespoon => dec!(14.78676478125),
            Self::FluidOunce => dec!(29.5735295625),
            Self::Cup => dec!(236.5882365),
            Self::Pint => dec!(473.176473),
            Self::Quart => dec!(946.352946),
            Self::Gallon => dec!(3785.411784),
            Self::Each => dec!(1),
            Self::Dozen => dec!(12),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Milligram => "mg",
            Self::Gram => "g",
            Self::Kilogram => "kg",
            Self::Ounce => "oz",
            Self::Pound => "lb",
            Self::Millilitre => "ml",
            Self::Centilitre => "cl",
            Self::Decilitre => "dl",
            Self::Litre => "l",
            Self::Teaspoon => "tsp",
            Self::Tablespoon => "tbsp",
            Self::FluidOunce => "fl oz",
            Self::Cup => "cup",
            Self::Pint => "pint",
            Self::Quart => "quart",
            Self::Gallon => "gallon",
            Self::Each => "each",
            Self::Dozen => "dozen",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = CostingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        let unit = match normalized.as_str() {
            "mg" | "milligram" | "milligrams" => Self::Milligram,
            "g" | "gr" | "gram" | "grams" | "gramme" | "grammes" => Self::Gram,
            "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => Self::Kilogram,
            "oz" | "ounce" | "ounces" => Self::Ounce,
            "lb" | "lbs" | "pound" | "pounds" => Self::Pound,
            "ml" | "millilitre" | "millilitres" | "milliliter" | "milliliters" => {
                Self::Millilitre
            }
            "cl" | "centilitre" | "centilitres" | "centiliter" | "centiliters" => {
                Self::Centilitre
            }
            "dl" | "decilitre" | "decilitres" | "deciliter" | "deciliters" => Self::Decilitre,
            "l" | "lt" | "litre" | "litres" | "liter" | "liters" => Self::Litre,
            "tsp" | "teaspoon" | "teaspoons" => Self::Teaspoon,
            "tbsp" | "tbs" | "tablespoon" | "tablespoons" => Self::Tablespoon,
            "fl oz" | "fl. oz" | "floz" | "fluid ounce" | "fluid ounces" => Self::FluidOunce,
            "cup" | "cups" => Self::Cup,
            "pt" | "pint" | "pints" => Self::Pint,
            "qt" | "quart" | "quarts" => Self::Quart,
            "gal" | "gallon" | "gallons" => Self::Gallon,
            "each" | "ea" | "pc" | "pcs" | "piece" | "pieces" | "unit" | "units" | "item"
            | "items" | "whole" => Self::Each,
            "dz" | "doz" | "dozen" => Self::Dozen,
            _ => return Err(CostingError::UnknownUnit(raw.to_string())),
        };
        Ok(unit)
    }
}

/// Re-expresses a cost per `from` unit as a cost per `to` unit.
///
/// `10` per `kg` becomes `0.01` per `g`. Both unit strings must parse and share
/// a dimension.
pub fn convert_cost_per_unit(cost: Decimal, from: &str, to: &str) -> Result<Decimal, CostingError> {
    let from_unit: Unit = from.parse()?;
    let to_unit: Unit = to.parse()?;

    if from_unit == to_unit {
        return Ok(cost);
    }

    if from_unit.dimension() != to_unit.dimension() {
        return Err(CostingError::IncompatibleUnits {
            from: from_unit,
            to: to_unit,
        });
    }

    cost.checked_mul(to_unit.base_factor())
        .and_then(|scaled| scaled.checked_div(from_unit.base_factor()))
        .ok_or(CostingError::Overflow("converted unit cost"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("Kg".parse::<Unit>().unwrap(), Unit::Kilogram);
        assert_eq!(" grams ".parse::<Unit>().unwrap(), Unit::Gram);
        assert_eq!("Tbsp.".parse::<Unit>().unwrap(), Unit::Tablespoon);
        assert_eq!("fl oz".parse::<Unit>().unwrap(), Unit::FluidOunce);
        assert_eq!("pcs".parse::<Unit>().unwrap(), Unit::Each);
    }

    #[test]
    fn kilogram_cost_becomes_gram_cost() {
        assert_eq!(convert_cost_per_unit(dec!(10), "kg", "g").unwrap(), dec!(0.01));
    }

    #[test]
    fn litre_cost_becomes_millilitre_cost() {
        assert_eq!(convert_cost_per_unit(dec!(2.50), "l", "ml").unwrap(), dec!(0.0025));
    }

    #[test]
    fn dozen_cost_becomes_each_cost() {
        assert_eq!(convert_cost_per_unit(dec!(6), "dozen", "each").unwrap(), dec!(0.5));
    }

    #[test]
    fn same_unit_is_identity() {
        assert_eq!(convert_cost_per_unit(dec!(3.33), "g", "gram").unwrap(), dec!(3.33));
    }

    #[test]
    fn rejects_mass_to_volume() {
        let err = convert_cost_per_unit(dec!(1), "kg", "ml").unwrap_err();
        assert_eq!(
            err,
            CostingError::IncompatibleUnits {
                from: Unit::Kilogram,
                to: Unit::Millilitre
            }
        );
    }

    #[test]
    fn rejects_cost_too_large_to_convert() {
        assert_eq!(
            convert_cost_per_unit(Decimal::MAX, "g", "kg"),
            Err(CostingError::Overflow("converted unit cost"))
        );
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = convert_cost_per_unit(dec!(1), "pinch", "g").unwrap_err();
        assert_eq!(err, CostingError::UnknownUnit("pinch".to_string()));
    }
}
