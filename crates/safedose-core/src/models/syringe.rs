//! Syringe models and the marking catalog.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::calculation::ErrorKind;

/// Insulin syringes are graduated in U-100 units: 100 units per mL.
pub const INSULIN_UNITS_PER_ML: f64 = 100.0;

/// Kind of syringe, which also decides the scale its markings use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyringeType {
    /// Graduated in mL
    Standard,
    /// Graduated in U-100 units
    Insulin,
}

impl SyringeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyringeType::Standard => "Standard",
            SyringeType::Insulin => "Insulin",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "standard" => Some(SyringeType::Standard),
            "insulin" => Some(SyringeType::Insulin),
            _ => None,
        }
    }

    /// Unit the syringe's markings are expressed in.
    pub fn scale_unit(&self) -> &'static str {
        match self {
            SyringeType::Standard => "mL",
            SyringeType::Insulin => "units",
        }
    }

    /// Convert a volume in mL to a reading on this syringe's scale.
    pub fn reading_from_ml(&self, volume_ml: f64) -> f64 {
        match self {
            SyringeType::Standard => volume_ml,
            SyringeType::Insulin => volume_ml * INSULIN_UNITS_PER_ML,
        }
    }
}

impl fmt::Display for SyringeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A syringe identified by type and capacity label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyringeSpec {
    pub syringe_type: SyringeType,
    /// Capacity label keying into the marking catalog (e.g. "3 ml", "100 Units")
    pub volume_capacity: String,
}

impl SyringeSpec {
    pub fn new(syringe_type: SyringeType, volume_capacity: impl Into<String>) -> Self {
        Self {
            syringe_type,
            volume_capacity: volume_capacity.into(),
        }
    }
}

/// Fixed mapping from (syringe type, capacity label) to ordered markings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkingCatalog {
    entries: BTreeMap<SyringeType, BTreeMap<String, Vec<f64>>>,
}

impl Default for MarkingCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MarkingCatalog {
    /// Empty catalog.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Catalog of the syringes supported out of the box.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();

        catalog.insert_unchecked(SyringeType::Insulin, "30 Units", graduations(1.0, 30.0));
        catalog.insert_unchecked(SyringeType::Insulin, "50 Units", graduations(1.0, 50.0));
        catalog.insert_unchecked(SyringeType::Insulin, "100 Units", graduations(2.0, 100.0));

        catalog.insert_unchecked(SyringeType::Standard, "1 ml", graduations(0.1, 1.0));
        catalog.insert_unchecked(SyringeType::Standard, "3 ml", graduations(0.5, 3.0));
        catalog.insert_unchecked(SyringeType::Standard, "5 ml", graduations(0.2, 5.0));
        catalog.insert_unchecked(SyringeType::Standard, "10 ml", graduations(1.0, 10.0));

        catalog
    }

    /// Add or replace an entry after validating its markings.
    pub fn insert(
        &mut self,
        syringe_type: SyringeType,
        label: &str,
        markings: Vec<f64>,
    ) -> Result<(), ErrorKind> {
        validate_markings(&markings)?;
        self.insert_unchecked(syringe_type, label, markings);
        Ok(())
    }

    fn insert_unchecked(&mut self, syringe_type: SyringeType, label: &str, markings: Vec<f64>) {
        self.entries
            .entry(syringe_type)
            .or_default()
            .insert(label.to_string(), markings);
    }

    /// Look up the markings for a syringe.
    ///
    /// Labels match case-insensitively with whitespace ignored, so "3ML" finds "3 ml".
    /// Entries that fail validation are reported as unknown rather than used.
    pub fn markings(&self, syringe_type: SyringeType, label: &str) -> Result<&[f64], ErrorKind> {
        let wanted = label_key(label);
        let markings = self
            .entries
            .get(&syringe_type)
            .and_then(|by_label| {
                by_label
                    .iter()
                    .find(|(candidate, _)| label_key(candidate) == wanted)
                    .map(|(_, markings)| markings.as_slice())
            })
            .ok_or(ErrorKind::UnknownSyringe)?;

        validate_markings(markings)?;
        Ok(markings)
    }

    /// Markings for a syringe spec.
    pub fn markings_for(&self, syringe: &SyringeSpec) -> Result<&[f64], ErrorKind> {
        self.markings(syringe.syringe_type, &syringe.volume_capacity)
    }

    /// Capacity labels available for a syringe type.
    pub fn labels(&self, syringe_type: SyringeType) -> Vec<String> {
        self.entries
            .get(&syringe_type)
            .map(|by_label| by_label.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Validate every entry.
    pub fn validate(&self) -> Result<(), (SyringeType, String)> {
        for (syringe_type, by_label) in &self.entries {
            for (label, markings) in by_label {
                if validate_markings(markings).is_err() {
                    return Err((*syringe_type, label.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Markings `step, 2*step, ..., max`, rounded to kill float drift (0.1 * 3 → 0.3).
fn graduations(step: f64, max: f64) -> Vec<f64> {
    let count = (max / step).round() as usize;
    (1..=count)
        .map(|i| ((i as f64) * step * 1000.0).round() / 1000.0)
        .collect()
}

fn label_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Markings must be non-empty, finite, positive and strictly increasing.
pub(crate) fn validate_markings(markings: &[f64]) -> Result<(), ErrorKind> {
    if markings.is_empty() {
        return Err(ErrorKind::UnknownSyringe);
    }
    if markings.iter().any(|m| !m.is_finite() || *m <= 0.0) {
        return Err(ErrorKind::UnknownSyringe);
    }
    if markings.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(ErrorKind::UnknownSyringe);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_three_ml() {
        let catalog = MarkingCatalog::builtin();
        let markings = catalog.markings(SyringeType::Standard, "3 ml").unwrap();
        assert_eq!(markings, &[0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn test_graduations_have_no_drift() {
        let catalog = MarkingCatalog::builtin();
        let markings = catalog.markings(SyringeType::Standard, "1 ml").unwrap();
        assert_eq!(markings.len(), 10);
        assert_eq!(markings[2], 0.3);
        assert_eq!(markings[9], 1.0);

        let insulin = catalog.markings(SyringeType::Insulin, "100 Units").unwrap();
        assert_eq!(insulin.first(), Some(&2.0));
        assert_eq!(insulin.last(), Some(&100.0));
        assert_eq!(insulin.len(), 50);
    }

    #[test]
    fn test_label_lookup_is_lenient_on_case_and_spacing() {
        let catalog = MarkingCatalog::builtin();
        assert!(catalog.markings(SyringeType::Standard, "3ML").is_ok());
        assert!(catalog.markings(SyringeType::Insulin, "100 units").is_ok());
    }

    #[test]
    fn test_unknown_syringe() {
        let catalog = MarkingCatalog::builtin();
        assert_eq!(
            catalog.markings(SyringeType::Standard, "7 ml"),
            Err(ErrorKind::UnknownSyringe)
        );
        // Type must match too
        assert_eq!(
            catalog.markings(SyringeType::Insulin, "3 ml"),
            Err(ErrorKind::UnknownSyringe)
        );
    }

    #[test]
    fn test_insert_rejects_malformed_markings() {
        let mut catalog = MarkingCatalog::empty();
        assert!(catalog
            .insert(SyringeType::Standard, "2 ml", vec![0.5, 0.5, 1.0])
            .is_err());
        assert!(catalog
            .insert(SyringeType::Standard, "2 ml", vec![1.0, f64::NAN])
            .is_err());
        assert!(catalog.insert(SyringeType::Standard, "2 ml", vec![]).is_err());
        assert!(catalog
            .insert(SyringeType::Standard, "2 ml", vec![0.5, 1.0, 1.5, 2.0])
            .is_ok());
        assert_eq!(catalog.labels(SyringeType::Standard), vec!["2 ml".to_string()]);
    }

    #[test]
    fn test_malformed_entry_from_json_is_unknown() {
        let json = r#"{"entries":{"Standard":{"2 ml":[1.0,0.5]}}}"#;
        let catalog: MarkingCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(
            catalog.markings(SyringeType::Standard, "2 ml"),
            Err(ErrorKind::UnknownSyringe)
        );
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_insulin_reading() {
        assert_eq!(SyringeType::Insulin.reading_from_ml(0.1), 10.0);
        assert_eq!(SyringeType::Standard.reading_from_ml(0.1), 0.1);
    }
}
