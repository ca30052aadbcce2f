//! Dose history models.

use serde::{Deserialize, Serialize};

use super::calculation::CalculationResult;
use super::dose::{DoseSpec, DoseUnit};
use super::syringe::{SyringeSpec, SyringeType};

/// A dose the user confirmed and drew.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseLog {
    /// Unique log ID
    pub id: String,
    /// Owner; `None` for local-only history
    pub user_id: Option<String>,
    /// Protocol the dose belongs to, if any
    pub protocol_id: Option<String>,
    pub substance_name: String,
    pub dose_value: f64,
    pub unit: DoseUnit,
    /// Volume on the syringe scale
    pub calculated_volume: f64,
    /// Volume in mL
    pub volume_ml: f64,
    pub syringe_type: SyringeType,
    pub recommended_marking: Option<f64>,
    /// When the dose was logged (RFC 3339)
    pub logged_at: String,
    pub notes: Option<String>,
}

impl DoseLog {
    /// Create a log entry from a successful calculation.
    ///
    /// Returns `None` when the calculation failed; failed results are never logged.
    pub fn from_calculation(
        substance_name: String,
        dose: &DoseSpec,
        syringe: &SyringeSpec,
        result: &CalculationResult,
    ) -> Option<Self> {
        let calculated_volume = result.calculated_volume?;
        let volume_ml = result.volume_ml?;

        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            protocol_id: None,
            substance_name,
            dose_value: dose.dose_value,
            unit: dose.unit,
            calculated_volume,
            volume_ml,
            syringe_type: syringe.syringe_type,
            recommended_marking: result.recommended_marking,
            logged_at: chrono::Utc::now().to_rfc3339(),
            notes: None,
        })
    }
}
