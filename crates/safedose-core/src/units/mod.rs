//! Unit parsing and conversion.
//!
//! Conversions are powers of ten within a family (mg↔mcg ×1000). Mass and
//! activity units have no defined conversion.

mod parser;

pub use parser::*;

use crate::models::{AmountUnit, ErrorKind};

/// Multiplier that converts a value in `from` into `to`.
pub fn conversion_factor(from: AmountUnit, to: AmountUnit) -> Result<f64, ErrorKind> {
    use AmountUnit::*;

    match (from, to) {
        (Mg, Mg) | (Mcg, Mcg) | (Units, Units) => Ok(1.0),
        (Mg, Mcg) => Ok(1000.0),
        (Mcg, Mg) => Ok(0.001),
        _ => Err(ErrorKind::UnitMismatch),
    }
}

/// Convert an amount between units of the same family.
pub fn convert_amount(value: f64, from: AmountUnit, to: AmountUnit) -> Result<f64, ErrorKind> {
    Ok(value * conversion_factor(from, to)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_conversion() {
        assert_eq!(convert_amount(500.0, AmountUnit::Mcg, AmountUnit::Mg), Ok(0.5));
        assert_eq!(convert_amount(2.0, AmountUnit::Mg, AmountUnit::Mcg), Ok(2000.0));
        assert_eq!(convert_amount(7.0, AmountUnit::Units, AmountUnit::Units), Ok(7.0));
    }

    #[test]
    fn test_mass_activity_mismatch() {
        assert_eq!(
            convert_amount(10.0, AmountUnit::Units, AmountUnit::Mg),
            Err(ErrorKind::UnitMismatch)
        );
        assert_eq!(
            conversion_factor(AmountUnit::Mcg, AmountUnit::Units),
            Err(ErrorKind::UnitMismatch)
        );
    }
}
