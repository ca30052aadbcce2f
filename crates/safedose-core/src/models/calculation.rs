//! Calculation outcome models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard failure of a calculation. Returned as a value, never raised.
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[error("input has no recognizable numeric component")]
    ParseFailure,

    #[error("dose must be a positive number")]
    InvalidDose,

    #[error("concentration and solution volume must be positive numbers")]
    InvalidConcentration,

    #[error("dose and concentration units cannot be reconciled")]
    UnitMismatch,

    #[error("no markings available for this syringe")]
    UnknownSyringe,
}

/// Non-fatal advisory that accompanies a valid result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Warning {
    /// Volume is below the smallest marking; the minimum marking was used.
    BelowMinimum,
    /// Volume exceeds the syringe capacity; the maximum marking was used.
    ExceedsCapacity,
    /// Volume is outside the typical injection range and needs acknowledgment.
    VolumeOutOfTypicalRange,
}

impl Warning {
    /// Message shown next to the result.
    pub fn message(&self) -> &'static str {
        match self {
            Warning::BelowMinimum => {
                "Volume is smaller than the first marking on this syringe"
            }
            Warning::ExceedsCapacity => "Volume exceeds the capacity of this syringe",
            Warning::VolumeOutOfTypicalRange => {
                "Volume is outside the typical range, double-check before drawing"
            }
        }
    }
}

/// Marking chosen for a volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MarkingSelection {
    /// Marking on the syringe scale
    pub marking: f64,
    /// Set when the volume fell outside the marked range
    pub warning: Option<Warning>,
}

/// Result of a draw-volume calculation.
///
/// Exactly one of `calculated_volume` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationResult {
    /// Volume on the syringe's own scale (mL for standard, units for insulin)
    pub calculated_volume: Option<f64>,
    /// Volume in mL regardless of syringe scale
    pub volume_ml: Option<f64>,
    /// Nearest marking on the syringe scale
    pub recommended_marking: Option<f64>,
    /// Advisories to surface with the result
    pub warnings: Vec<Warning>,
    /// Hard failure
    pub error: Option<ErrorKind>,
}

impl CalculationResult {
    /// Build a successful result.
    pub fn success(
        calculated_volume: f64,
        volume_ml: f64,
        recommended_marking: f64,
        warnings: Vec<Warning>,
    ) -> Self {
        Self {
            calculated_volume: Some(calculated_volume),
            volume_ml: Some(volume_ml),
            recommended_marking: Some(recommended_marking),
            warnings,
            error: None,
        }
    }

    /// Build a failed result.
    pub fn failure(error: ErrorKind) -> Self {
        Self {
            calculated_volume: None,
            volume_ml: None,
            recommended_marking: None,
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn has_warning(&self, warning: Warning) -> bool {
        self.warnings.contains(&warning)
    }

    /// Marking text for display.
    ///
    /// Empty when the calculation failed for a reason other than an unknown syringe.
    pub fn marking_label(&self) -> String {
        match (self.recommended_marking, self.error) {
            (Some(marking), _) => format!("{}", marking),
            (None, Some(ErrorKind::UnknownSyringe)) => "no markings available".to_string(),
            (None, _) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure_are_exclusive() {
        let ok = CalculationResult::success(0.5, 0.5, 0.5, vec![]);
        assert!(ok.is_ok());
        assert!(ok.calculated_volume.is_some());

        let err = CalculationResult::failure(ErrorKind::UnknownSyringe);
        assert!(!err.is_ok());
        assert!(err.calculated_volume.is_none());
        assert_eq!(err.marking_label(), "no markings available");
    }

    #[test]
    fn test_marking_label_placeholder_only_for_unknown_syringe() {
        assert_eq!(CalculationResult::success(1.0, 1.0, 1.0, vec![]).marking_label(), "1");
        for error in [
            ErrorKind::InvalidDose,
            ErrorKind::InvalidConcentration,
            ErrorKind::UnitMismatch,
        ] {
            assert_eq!(CalculationResult::failure(error).marking_label(), "");
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ErrorKind::InvalidDose.to_string(),
            "dose must be a positive number"
        );
    }
}
