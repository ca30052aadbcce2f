//! Scan response parsing.

use std::fmt;

use safedose_core::models::{
    AmountUnit, ConcentrationSpec, DoseUnit, MarkingCatalog, SyringeType, INSULIN_UNITS_PER_ML,
};
use safedose_core::units::{parse_quantity, ParsedUnit};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Scan parsing errors.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

/// One field read by the model.
///
/// `Unreadable` means the item was seen but not legible; `Missing` means the
/// model reported nothing. Neither is ever turned into a guessed value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanField {
    Value(String),
    Unreadable,
    #[default]
    Missing,
}

impl ScanField {
    /// Classify raw text from the model.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            ScanField::Missing
        } else if text.eq_ignore_ascii_case("unreadable") {
            ScanField::Unreadable
        } else {
            ScanField::Value(text.to_string())
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            ScanField::Value(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, ScanField::Unreadable)
    }
}

impl fmt::Display for ScanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanField::Value(text) => f.write_str(text),
            ScanField::Unreadable => f.write_str("unreadable"),
            ScanField::Missing => f.write_str("missing"),
        }
    }
}

impl Serialize for ScanField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScanField::Value(text) => serializer.serialize_str(text),
            ScanField::Unreadable => serializer.serialize_str("unreadable"),
            ScanField::Missing => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ScanField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(ScanField::Missing),
            serde_json::Value::String(text) => Ok(ScanField::from_text(&text)),
            serde_json::Value::Number(number) => Ok(ScanField::Value(number.to_string())),
            other => Err(de::Error::custom(format!(
                "expected a string or null, got {}",
                other
            ))),
        }
    }
}

/// What the model read off the syringe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyringeScan {
    #[serde(rename = "type", alias = "syringe_type", default)]
    pub syringe_type: ScanField,
    #[serde(default)]
    pub volume: ScanField,
    #[serde(default)]
    pub markings: ScanField,
}

/// What the model read off the vial label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VialScan {
    #[serde(default)]
    pub substance: ScanField,
    #[serde(rename = "totalAmount", alias = "total_amount", default)]
    pub total_amount: ScanField,
    #[serde(default)]
    pub concentration: ScanField,
    #[serde(default)]
    pub expiration: ScanField,
}

/// Complete scan response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanOutput {
    #[serde(default)]
    pub syringe: SyringeScan,
    #[serde(default)]
    pub vial: VialScan,
}

/// Calculator inputs recovered from a scan. Every field is optional; the
/// user confirms or completes them before calculating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanPrefill {
    pub syringe_type: Option<SyringeType>,
    /// Capacity label from the marking catalog (e.g. "3 ml", "100 Units")
    pub syringe_volume: Option<String>,
    pub substance: Option<String>,
    pub total_amount: Option<f64>,
    pub total_amount_unit: Option<AmountUnit>,
    pub concentration: Option<ConcentrationSpec>,
    pub expiration: Option<String>,
    /// Names of the fields the model could not read
    pub unreadable: Vec<String>,
}

/// Parse model output into a scan.
pub fn parse_scan_output(text: &str) -> ScanResult<ScanOutput> {
    // Try to find JSON in the response (in case the model adds extra text)
    let json_start = text
        .find('{')
        .ok_or_else(|| ScanError::InvalidFormat("No JSON object found in response".into()))?;
    let json_end = text
        .rfind('}')
        .filter(|end| *end > json_start)
        .ok_or_else(|| ScanError::InvalidFormat("No closing brace found in response".into()))?;

    let output: ScanOutput = serde_json::from_str(&text[json_start..=json_end])?;
    Ok(output)
}

impl ScanOutput {
    /// Map readable fields to calculator inputs using the built-in catalog.
    pub fn prefill(&self) -> ScanPrefill {
        self.prefill_with(&MarkingCatalog::builtin())
    }

    /// Map readable fields to calculator inputs.
    ///
    /// A syringe volume is only kept when it names a syringe in `catalog`.
    pub fn prefill_with(&self, catalog: &MarkingCatalog) -> ScanPrefill {
        let mut prefill = ScanPrefill::default();

        let fields = [
            ("syringe.type", &self.syringe.syringe_type),
            ("syringe.volume", &self.syringe.volume),
            ("syringe.markings", &self.syringe.markings),
            ("vial.substance", &self.vial.substance),
            ("vial.totalAmount", &self.vial.total_amount),
            ("vial.concentration", &self.vial.concentration),
            ("vial.expiration", &self.vial.expiration),
        ];
        prefill.unreadable = fields
            .iter()
            .filter(|(_, field)| field.is_unreadable())
            .map(|(name, _)| name.to_string())
            .collect();

        let volume_text = self.syringe.volume.value();
        prefill.syringe_type = self
            .syringe
            .syringe_type
            .value()
            .and_then(syringe_type_from_text)
            .or_else(|| volume_text.and_then(syringe_type_from_volume));
        if let (Some(syringe_type), Some(text)) = (prefill.syringe_type, volume_text) {
            prefill.syringe_volume = capacity_label(text, syringe_type)
                .filter(|label| catalog.markings(syringe_type, label).is_ok());
        }

        prefill.substance = self.vial.substance.value().map(String::from);
        prefill.expiration = self.vial.expiration.value().map(String::from);

        if let Some((amount, unit)) = self.vial.total_amount.value().and_then(total_amount) {
            prefill.total_amount = Some(amount);
            prefill.total_amount_unit = Some(unit);
        }
        prefill.concentration = self.vial.concentration.value().and_then(concentration);

        if !prefill.unreadable.is_empty() {
            tracing::debug!(
                unreadable = ?prefill.unreadable,
                "Scan has unreadable fields"
            );
        }

        prefill
    }
}

fn syringe_type_from_text(text: &str) -> Option<SyringeType> {
    SyringeType::from_label(text).or_else(|| {
        let lower = text.to_lowercase();
        if lower.contains("insulin") {
            Some(SyringeType::Insulin)
        } else if lower.contains("standard") {
            Some(SyringeType::Standard)
        } else {
            None
        }
    })
}

/// Insulin barrels are marked in units; everything else in mL.
fn syringe_type_from_volume(text: &str) -> Option<SyringeType> {
    match parse_quantity(text).unit? {
        ParsedUnit::Dose(DoseUnit::Units) => Some(SyringeType::Insulin),
        ParsedUnit::Dose(DoseUnit::Ml) => Some(SyringeType::Standard),
        _ => None,
    }
}

fn capacity_label(text: &str, syringe_type: SyringeType) -> Option<String> {
    let parsed = parse_quantity(text);
    let amount = parsed.amount.value().filter(|a| a.is_finite() && *a > 0.0)?;

    let label = match (syringe_type, parsed.unit) {
        // "0.3 mL" insulin syringe is the 30 unit barrel
        (SyringeType::Insulin, Some(ParsedUnit::Dose(DoseUnit::Ml))) => {
            format!("{} Units", (amount * INSULIN_UNITS_PER_ML).round())
        }
        (SyringeType::Insulin, _) => format!("{} Units", amount),
        (SyringeType::Standard, _) => format!("{} ml", amount),
    };
    Some(label)
}

fn total_amount(text: &str) -> Option<(f64, AmountUnit)> {
    let parsed = parse_quantity(text);
    let amount = parsed.amount.value().filter(|a| *a > 0.0)?;
    match parsed.unit? {
        ParsedUnit::Dose(unit) => Some((amount, unit.amount_unit()?)),
        ParsedUnit::Concentration(_) => None,
    }
}

fn concentration(text: &str) -> Option<ConcentrationSpec> {
    let parsed = parse_quantity(text);
    let amount = parsed.amount.value().filter(|a| *a > 0.0)?;
    match parsed.unit? {
        ParsedUnit::Concentration(unit) => Some(ConcentrationSpec::direct(amount, unit)),
        ParsedUnit::Dose(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safedose_core::models::ConcentrationUnit;

    #[test]
    fn test_parse_scan_output() {
        let json = r#"{"syringe":{"type":"Standard","volume":"3 ml","markings":"0.5 ml"},"vial":{"substance":"Testosterone","totalAmount":"2000 mg","concentration":"200 mg/mL","expiration":"2026-05"}}"#;

        let output = parse_scan_output(json).unwrap();
        assert_eq!(output.syringe.syringe_type, ScanField::Value("Standard".into()));
        assert_eq!(output.vial.concentration.value(), Some("200 mg/mL"));
    }

    #[test]
    fn test_parse_scan_output_with_prefix() {
        let text = r#"Here is what I can see:
{"syringe":{"type":"Insulin","volume":"unreadable","markings":null},"vial":{}}
Let me know if you need anything else."#;

        let output = parse_scan_output(text).unwrap();
        assert!(output.syringe.volume.is_unreadable());
        assert_eq!(output.syringe.markings, ScanField::Missing);
        assert_eq!(output.vial.substance, ScanField::Missing);
    }

    #[test]
    fn test_parse_scan_output_rejects_non_json() {
        assert!(matches!(
            parse_scan_output("I could not see a syringe"),
            Err(ScanError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_scan_output("} backwards {"),
            Err(ScanError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_scan_output("{ not json }"),
            Err(ScanError::JsonParse(_))
        ));
    }

    #[test]
    fn test_field_classification() {
        assert_eq!(ScanField::from_text("  UNREADABLE "), ScanField::Unreadable);
        assert_eq!(ScanField::from_text(""), ScanField::Missing);
        assert_eq!(ScanField::from_text(" 3 ml "), ScanField::Value("3 ml".into()));

        let field: ScanField = serde_json::from_str("3").unwrap();
        assert_eq!(field, ScanField::Value("3".into()));
        assert!(serde_json::from_str::<ScanField>("[1]").is_err());
    }

    #[test]
    fn test_field_serialization() {
        let scan = SyringeScan {
            syringe_type: ScanField::Value("Insulin".into()),
            volume: ScanField::Unreadable,
            markings: ScanField::Missing,
        };
        let json = serde_json::to_string(&scan).unwrap();
        assert_eq!(json, r#"{"type":"Insulin","volume":"unreadable","markings":null}"#);
    }

    #[test]
    fn test_prefill_standard_syringe() {
        let json = r#"{"syringe":{"type":"Standard","volume":"3ML","markings":null},"vial":{"substance":"Testosterone cypionate","totalAmount":"2000 mg","concentration":"200 mg/mL","expiration":null}}"#;
        let prefill = parse_scan_output(json).unwrap().prefill();

        assert_eq!(prefill.syringe_type, Some(SyringeType::Standard));
        assert_eq!(prefill.syringe_volume.as_deref(), Some("3 ml"));
        assert_eq!(prefill.substance.as_deref(), Some("Testosterone cypionate"));
        assert_eq!(prefill.total_amount, Some(2000.0));
        assert_eq!(prefill.total_amount_unit, Some(AmountUnit::Mg));
        assert_eq!(
            prefill.concentration,
            Some(ConcentrationSpec::direct(200.0, ConcentrationUnit::MgPerMl))
        );
        assert!(prefill.unreadable.is_empty());
    }

    #[test]
    fn test_prefill_infers_insulin_from_volume() {
        let json = r#"{"syringe":{"type":null,"volume":"0.3 mL"},"vial":{"concentration":"100 u/ml"}}"#;
        let prefill = parse_scan_output(json).unwrap().prefill();

        // mL-marked capacity without a type reads as a standard syringe
        assert_eq!(prefill.syringe_type, Some(SyringeType::Standard));
        assert_eq!(prefill.syringe_volume, None);

        let json = r#"{"syringe":{"type":"insulin syringe","volume":"0.3 mL"},"vial":{}}"#;
        let prefill = parse_scan_output(json).unwrap().prefill();
        assert_eq!(prefill.syringe_type, Some(SyringeType::Insulin));
        assert_eq!(prefill.syringe_volume.as_deref(), Some("30 Units"));

        let json = r#"{"syringe":{"volume":"50 units"},"vial":{}}"#;
        let prefill = parse_scan_output(json).unwrap().prefill();
        assert_eq!(prefill.syringe_type, Some(SyringeType::Insulin));
        assert_eq!(prefill.syringe_volume.as_deref(), Some("50 Units"));
    }

    #[test]
    fn test_prefill_never_guesses() {
        let json = r#"{"syringe":{"type":"Standard","volume":"7 ml"},"vial":{"substance":"unreadable","totalAmount":"a lot","concentration":"5 mg","expiration":"unreadable"}}"#;
        let prefill = parse_scan_output(json).unwrap().prefill();

        // 7 ml is not a known syringe
        assert_eq!(prefill.syringe_volume, None);
        assert_eq!(prefill.substance, None);
        assert_eq!(prefill.total_amount, None);
        // A mass is not a concentration
        assert_eq!(prefill.concentration, None);
        assert_eq!(
            prefill.unreadable,
            vec!["vial.substance".to_string(), "vial.expiration".to_string()]
        );
    }

    #[test]
    fn test_prefill_with_custom_catalog() {
        let mut catalog = MarkingCatalog::empty();
        catalog
            .insert(SyringeType::Standard, "7 ml", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0])
            .unwrap();

        let json = r#"{"syringe":{"type":"Standard","volume":"7 ml"},"vial":{}}"#;
        let prefill = parse_scan_output(json).unwrap().prefill_with(&catalog);
        assert_eq!(prefill.syringe_volume.as_deref(), Some("7 ml"));
    }
}
