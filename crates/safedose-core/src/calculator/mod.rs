//! Draw-volume calculator.
//!
//! Pipeline: Dose validation → Concentration resolution → Volume → Marking selection

mod marking;

pub use marking::*;

use std::sync::LazyLock;

use crate::config::SafeDoseConfig;
use crate::models::{
    is_positive, AmountUnit, CalculationResult, ConcentrationSpec, DoseSpec, ErrorKind,
    SyringeSpec, SyringeType, Warning, INSULIN_UNITS_PER_ML,
};
use crate::units::convert_amount;

static DEFAULT_CALCULATOR: LazyLock<DoseCalculator> = LazyLock::new(DoseCalculator::new);

/// A volume expressed both on the syringe scale and in mL.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Draw {
    reading: f64,
    volume_ml: f64,
}

/// Calculator bound to a marking catalog and safety range.
#[derive(Debug, Clone, Default)]
pub struct DoseCalculator {
    config: SafeDoseConfig,
}

impl DoseCalculator {
    /// Create a calculator with the built-in configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a calculator with a custom configuration.
    pub fn with_config(config: SafeDoseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SafeDoseConfig {
        &self.config
    }

    /// Calculate the volume to draw for a dose.
    ///
    /// `concentration` may be omitted for doses given in mL, and for doses in
    /// units drawn with an insulin syringe (U-100: the dose is read directly
    /// off the syringe). Failures are returned in the result, never raised.
    pub fn calculate_volume(
        &self,
        dose: &DoseSpec,
        concentration: Option<&ConcentrationSpec>,
        syringe: &SyringeSpec,
    ) -> CalculationResult {
        match self.try_calculate(dose, concentration, syringe) {
            Ok(result) => result,
            Err(error) => {
                tracing::debug!(
                    error = ?error,
                    dose_unit = %dose.unit,
                    concentration_unit = ?concentration.map(ConcentrationSpec::unit),
                    syringe_type = %syringe.syringe_type,
                    "Dose calculation failed"
                );
                CalculationResult::failure(error)
            }
        }
    }

    fn try_calculate(
        &self,
        dose: &DoseSpec,
        concentration: Option<&ConcentrationSpec>,
        syringe: &SyringeSpec,
    ) -> Result<CalculationResult, ErrorKind> {
        if !is_positive(dose.dose_value) {
            return Err(ErrorKind::InvalidDose);
        }

        let markings = self.config.marking_catalog.markings_for(syringe)?;
        let draw = draw_volume(dose, concentration, syringe.syringe_type)?;
        let selection = select_marking(draw.reading, markings)?;

        let mut warnings = Vec::new();
        if let Some(warning) = selection.warning {
            warnings.push(warning);
        }
        if !self.config.safe_range.contains(draw.volume_ml) {
            warnings.push(Warning::VolumeOutOfTypicalRange);
        }

        if !warnings.is_empty() {
            tracing::debug!(
                volume_ml = draw.volume_ml,
                marking = selection.marking,
                warnings = ?warnings,
                "Dose calculation produced advisories"
            );
        }

        Ok(CalculationResult::success(
            draw.reading,
            draw.volume_ml,
            selection.marking,
            warnings,
        ))
    }
}

/// Calculate with the built-in configuration.
pub fn calculate_volume(
    dose: &DoseSpec,
    concentration: Option<&ConcentrationSpec>,
    syringe: &SyringeSpec,
) -> CalculationResult {
    DEFAULT_CALCULATOR.calculate_volume(dose, concentration, syringe)
}

/// Resolve a concentration to `(amount per mL, amount unit)`.
///
/// The total-amount form is divided by its solution volume.
pub fn resolve_concentration(spec: &ConcentrationSpec) -> Result<(f64, AmountUnit), ErrorKind> {
    match *spec {
        ConcentrationSpec::Direct { amount, unit } => {
            if !is_positive(amount) {
                return Err(ErrorKind::InvalidConcentration);
            }
            Ok((amount, unit.amount_unit()))
        }
        ConcentrationSpec::FromTotal {
            total_amount,
            total_amount_unit,
            solution_volume_ml,
        } => {
            if !is_positive(total_amount) || !is_positive(solution_volume_ml) {
                return Err(ErrorKind::InvalidConcentration);
            }
            Ok((total_amount / solution_volume_ml, total_amount_unit))
        }
    }
}

fn draw_volume(
    dose: &DoseSpec,
    concentration: Option<&ConcentrationSpec>,
    syringe_type: SyringeType,
) -> Result<Draw, ErrorKind> {
    let Some(dose_unit) = dose.unit.amount_unit() else {
        // Dose already given as a volume
        return Ok(Draw {
            reading: syringe_type.reading_from_ml(dose.dose_value),
            volume_ml: dose.dose_value,
        });
    };

    let spec = match concentration {
        Some(spec) => spec,
        None if dose_unit == AmountUnit::Units && syringe_type == SyringeType::Insulin => {
            return Ok(Draw {
                reading: dose.dose_value,
                volume_ml: dose.dose_value / INSULIN_UNITS_PER_ML,
            });
        }
        None => return Err(ErrorKind::InvalidConcentration),
    };

    let (per_ml, concentration_unit) = resolve_concentration(spec)?;
    let dose_amount = convert_amount(dose.dose_value, dose_unit, concentration_unit)?;
    let volume_ml = dose_amount / per_ml;

    Ok(Draw {
        reading: syringe_type.reading_from_ml(volume_ml),
        volume_ml,
    })
}
