//! Dose and concentration models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit a dose is prescribed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DoseUnit {
    #[serde(rename = "mg")]
    Mg,
    #[serde(rename = "mcg")]
    Mcg,
    #[serde(rename = "units")]
    Units,
    #[serde(rename = "mL")]
    Ml,
}

/// Unit of a direct concentration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConcentrationUnit {
    #[serde(rename = "mg/mL")]
    MgPerMl,
    #[serde(rename = "mcg/mL")]
    McgPerMl,
    #[serde(rename = "units/mL")]
    UnitsPerMl,
}

/// Unit of a total amount of substance in a vial.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AmountUnit {
    #[serde(rename = "mg")]
    Mg,
    #[serde(rename = "mcg")]
    Mcg,
    #[serde(rename = "units")]
    Units,
}

/// Family a unit belongs to. Conversions are only defined within a family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UnitFamily {
    /// mg, mcg
    Mass,
    /// units (IU)
    Activity,
    /// mL
    Volume,
    /// mg/mL, mcg/mL, units/mL
    Concentration,
}

impl DoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnit::Mg => "mg",
            DoseUnit::Mcg => "mcg",
            DoseUnit::Units => "units",
            DoseUnit::Ml => "mL",
        }
    }

    pub fn family(&self) -> UnitFamily {
        match self {
            DoseUnit::Mg | DoseUnit::Mcg => UnitFamily::Mass,
            DoseUnit::Units => UnitFamily::Activity,
            DoseUnit::Ml => UnitFamily::Volume,
        }
    }

    /// The amount unit this dose unit measures, if it is not a volume.
    pub fn amount_unit(&self) -> Option<AmountUnit> {
        match self {
            DoseUnit::Mg => Some(AmountUnit::Mg),
            DoseUnit::Mcg => Some(AmountUnit::Mcg),
            DoseUnit::Units => Some(AmountUnit::Units),
            DoseUnit::Ml => None,
        }
    }

    /// Parse from a persisted or user-facing label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mg" => Some(DoseUnit::Mg),
            "mcg" | "ug" | "µg" => Some(DoseUnit::Mcg),
            "units" | "unit" | "u" | "iu" => Some(DoseUnit::Units),
            "ml" | "cc" => Some(DoseUnit::Ml),
            _ => None,
        }
    }
}

impl ConcentrationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcentrationUnit::MgPerMl => "mg/mL",
            ConcentrationUnit::McgPerMl => "mcg/mL",
            ConcentrationUnit::UnitsPerMl => "units/mL",
        }
    }

    /// The amount unit in the numerator (mg/mL → mg).
    pub fn amount_unit(&self) -> AmountUnit {
        match self {
            ConcentrationUnit::MgPerMl => AmountUnit::Mg,
            ConcentrationUnit::McgPerMl => AmountUnit::Mcg,
            ConcentrationUnit::UnitsPerMl => AmountUnit::Units,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let compact: String = label
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match compact.as_str() {
            "mg/ml" => Some(ConcentrationUnit::MgPerMl),
            "mcg/ml" | "ug/ml" | "µg/ml" => Some(ConcentrationUnit::McgPerMl),
            "units/ml" | "unit/ml" | "u/ml" | "iu/ml" => Some(ConcentrationUnit::UnitsPerMl),
            _ => None,
        }
    }
}

impl AmountUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountUnit::Mg => "mg",
            AmountUnit::Mcg => "mcg",
            AmountUnit::Units => "units",
        }
    }

    pub fn family(&self) -> UnitFamily {
        match self {
            AmountUnit::Mg | AmountUnit::Mcg => UnitFamily::Mass,
            AmountUnit::Units => UnitFamily::Activity,
        }
    }

    /// Concentration unit with this amount unit per mL.
    pub fn per_ml(&self) -> ConcentrationUnit {
        match self {
            AmountUnit::Mg => ConcentrationUnit::MgPerMl,
            AmountUnit::Mcg => ConcentrationUnit::McgPerMl,
            AmountUnit::Units => ConcentrationUnit::UnitsPerMl,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        DoseUnit::from_label(label).and_then(|u| u.amount_unit())
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ConcentrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AmountUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dose the user intends to administer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DoseSpec {
    /// Dose magnitude, must be positive
    pub dose_value: f64,
    /// Dose unit
    pub unit: DoseUnit,
}

impl DoseSpec {
    pub fn new(dose_value: f64, unit: DoseUnit) -> Self {
        Self { dose_value, unit }
    }
}

/// Finite and strictly greater than zero.
pub(crate) fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// How the medication is diluted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum ConcentrationSpec {
    /// Concentration read directly off the label (e.g. 10 mg/mL).
    Direct { amount: f64, unit: ConcentrationUnit },
    /// Total amount reconstituted in a solvent volume.
    FromTotal {
        total_amount: f64,
        total_amount_unit: AmountUnit,
        solution_volume_ml: f64,
    },
}

impl ConcentrationSpec {
    pub fn direct(amount: f64, unit: ConcentrationUnit) -> Self {
        ConcentrationSpec::Direct { amount, unit }
    }

    pub fn from_total(total_amount: f64, total_amount_unit: AmountUnit, solution_volume_ml: f64) -> Self {
        ConcentrationSpec::FromTotal {
            total_amount,
            total_amount_unit,
            solution_volume_ml,
        }
    }

    /// Unit of the (possibly derived) concentration.
    pub fn unit(&self) -> ConcentrationUnit {
        match self {
            ConcentrationSpec::Direct { unit, .. } => *unit,
            ConcentrationSpec::FromTotal {
                total_amount_unit, ..
            } => total_amount_unit.per_ml(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_labels() {
        assert_eq!(DoseUnit::from_label("MG"), Some(DoseUnit::Mg));
        assert_eq!(DoseUnit::from_label("cc"), Some(DoseUnit::Ml));
        assert_eq!(DoseUnit::from_label("IU"), Some(DoseUnit::Units));
        assert_eq!(DoseUnit::from_label("tablets"), None);

        assert_eq!(
            ConcentrationUnit::from_label("U / mL"),
            Some(ConcentrationUnit::UnitsPerMl)
        );
        assert_eq!(
            ConcentrationUnit::from_label("mcg/ml"),
            Some(ConcentrationUnit::McgPerMl)
        );
    }

    #[test]
    fn test_is_positive() {
        assert!(is_positive(0.01));
        for value in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(!is_positive(value), "{}", value);
        }
    }

    #[test]
    fn test_derived_concentration_unit() {
        let spec = ConcentrationSpec::from_total(10.0, AmountUnit::Mg, 2.0);
        assert_eq!(spec.unit(), ConcentrationUnit::MgPerMl);
        assert_eq!(ConcentrationUnit::UnitsPerMl.amount_unit(), AmountUnit::Units);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DoseSpec::new(5.0, DoseUnit::Ml)).unwrap();
        assert_eq!(json, r#"{"dose_value":5.0,"unit":"mL"}"#);

        let spec: ConcentrationSpec =
            serde_json::from_str(r#"{"form":"direct","amount":10.0,"unit":"mg/mL"}"#).unwrap();
        assert_eq!(spec, ConcentrationSpec::direct(10.0, ConcentrationUnit::MgPerMl));
    }
}
